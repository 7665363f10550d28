use thiserror::Error;

use crate::application::session::SessionError;
use crate::domain::ValidationError;

/// Failures surfaced by the handshake orchestrator.
///
/// Timeouts and interrupts are not errors; they come back as
/// [`super::HandshakeOutcome`] variants.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// The engine reported a protocol or I/O failure.
    #[error("engine failure: {0}")]
    Engine(String),

    /// The peer chain was rejected by the caller's validator. Kept apart from
    /// `Engine` so trust failures can be told from protocol failures.
    #[error("certificate rejected: {0}")]
    Certificate(String),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("session capture failed: {0}")]
    Session(#[from] SessionError),
}
