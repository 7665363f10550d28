//! In-crate test doubles, shared by unit and integration tests.
pub mod gateway;
pub mod support;

pub use gateway::{
    Completion, ConnectionRecord, HandshakeScript, ScriptedGateway, ScriptedResult, SessionScript,
};
pub use support::{CredentialChoice, RecordingHandler};
