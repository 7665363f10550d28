//! Cross-thread interruption of a blocking handshake.
//!
//! The orchestrator publishes `InProgress` and only then reads the request
//! bit; a handle sets the bit and only then reads the status. With both
//! sides on `SeqCst`, at least one of them observes the other, so a request
//! racing the start either reaches the engine or is seen at the first
//! checkpoint.
//!
//! Interrupt requests and success are claimed on one control word: once the
//! handshake has settled on success (completion forwarded, or the engine
//! returned a session) a request is refused, and once a request is accepted
//! the handshake can no longer settle on success.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

use super::fsm_types::HandshakeStatus;
use crate::ports::{ConnectionHandle, EngineGateway};

const INTERRUPT_REQUESTED: u8 = 0b01;
const SETTLED: u8 = 0b10;

pub(crate) struct HandshakeShared {
    status: AtomicU8,
    control: AtomicU8,
    gateway: Arc<dyn EngineGateway>,
    ssl: ConnectionHandle,
}

impl HandshakeShared {
    pub(crate) fn new(gateway: Arc<dyn EngineGateway>, ssl: ConnectionHandle) -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU8::new(HandshakeStatus::NotStarted as u8),
            control: AtomicU8::new(0),
            gateway,
            ssl,
        })
    }

    pub(crate) fn status(&self) -> HandshakeStatus {
        HandshakeStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub(crate) fn store_status(&self, status: HandshakeStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    pub(crate) fn interrupt_requested(&self) -> bool {
        self.control.load(Ordering::SeqCst) & INTERRUPT_REQUESTED != 0
    }

    /// Claim success. Fails only when an interrupt was accepted first;
    /// claiming twice succeeds.
    pub(crate) fn settle(&self) -> bool {
        self.control
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                (c & INTERRUPT_REQUESTED == 0).then_some(c | SETTLED)
            })
            .is_ok()
    }

    /// First request before success wins; everything later is refused.
    fn request_interrupt(&self) -> bool {
        self.control
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                (c == 0).then_some(INTERRUPT_REQUESTED)
            })
            .is_ok()
    }
}

/// Cloneable handle that asks a running handshake to stop.
#[derive(Clone)]
pub struct InterruptHandle {
    shared: Arc<HandshakeShared>,
}

impl InterruptHandle {
    pub(crate) fn new(shared: Arc<HandshakeShared>) -> Self {
        Self { shared }
    }

    /// Request interruption. Returns `true` only for the first request made
    /// before the handshake settled. Any later request is a no-op returning
    /// `false`.
    pub fn interrupt(&self) -> bool {
        if self.shared.status().is_terminal() {
            return false;
        }
        if !self.shared.request_interrupt() {
            debug!("interrupt ignored: already requested or handshake settled");
            return false;
        }
        if self.shared.status() == HandshakeStatus::InProgress {
            debug!(ssl = self.shared.ssl.raw(), "forwarding interrupt to engine");
            self.shared.gateway.interrupt(self.shared.ssl);
        }
        true
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.shared.interrupt_requested()
    }

    #[must_use]
    pub fn status(&self) -> HandshakeStatus {
        self.shared.status()
    }
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("ssl", &self.shared.ssl)
            .field("status", &self.shared.status())
            .field("requested", &self.shared.interrupt_requested())
            .finish()
    }
}
