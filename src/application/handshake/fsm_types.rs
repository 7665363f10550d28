use crate::application::session::SessionRecord;

/// Which side of the connection the orchestrator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Sends SNI and answers certificate requests.
    Client,
    /// Certificate requests arriving in this mode are ignored.
    Server,
}

/// Lifecycle of one handshake. The last four states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeStatus {
    NotStarted = 0,
    InProgress = 1,
    Completed = 2,
    Failed = 3,
    TimedOut = 4,
    Interrupted = 5,
}

impl HandshakeStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, HandshakeStatus::NotStarted | HandshakeStatus::InProgress)
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => HandshakeStatus::NotStarted,
            1 => HandshakeStatus::InProgress,
            2 => HandshakeStatus::Completed,
            3 => HandshakeStatus::Failed,
            4 => HandshakeStatus::TimedOut,
            _ => HandshakeStatus::Interrupted,
        }
    }
}

/// Logical triggers that move a [`HandshakeStatus`] forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    Start,
    EngineSucceeded,
    EngineFailed,
    CertificateRejected,
    DeadlineExpired,
    InterruptObserved,
}

/// Transition table. `None` means the event is illegal in `current`.
#[must_use]
pub fn next_status(current: HandshakeStatus, ev: HandshakeEvent) -> Option<HandshakeStatus> {
    use HandshakeEvent as E;
    use HandshakeStatus as S;
    let next = match (current, ev) {
        (S::NotStarted, E::Start) => S::InProgress,
        (S::InProgress, E::EngineSucceeded) => S::Completed,
        (S::InProgress, E::EngineFailed | E::CertificateRejected) => S::Failed,
        (S::InProgress, E::DeadlineExpired) => S::TimedOut,
        (S::InProgress, E::InterruptObserved) => S::Interrupted,
        _ => return None,
    };
    Some(next)
}

/// Terminal results that are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Completed(SessionRecord),
    TimedOut,
    Interrupted,
}

impl HandshakeOutcome {
    #[must_use]
    pub fn status(&self) -> HandshakeStatus {
        match self {
            HandshakeOutcome::Completed(_) => HandshakeStatus::Completed,
            HandshakeOutcome::TimedOut => HandshakeStatus::TimedOut,
            HandshakeOutcome::Interrupted => HandshakeStatus::Interrupted,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&SessionRecord> {
        match self {
            HandshakeOutcome::Completed(s) => Some(s),
            _ => None,
        }
    }
}
