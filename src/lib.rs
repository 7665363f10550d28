//! Crate root for `tlsgate`.
//!
//! `tlsgate` sits between a TLS consumer and an external native crypto
//! engine. The engine is only ever reached through the [`ports::EngineGateway`]
//! trait; everything in this crate is naming, policy and orchestration.
//!
//! High‑level tree:
//! * `domain` – cipher-suite registry, protocol policy, engine flag words,
//!   provider service table and the frozen [`domain::EngineCatalog`].
//! * `ports` – the gateway contract (opaque handles + operations) and the
//!   handshake callback contracts.
//! * `core` – RAII guards over native handles and the strict CBOR codec.
//! * `application` – the handshake orchestrator and session records.
//! * `config` – serde-driven settings loaded from JSON or YAML.
//! * `test_support` – scripted engine double, only built for tests or with
//!   the `test-support` feature.
pub mod application;
pub mod config;
pub mod core;
pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;

pub use application::handshake::{
    HandshakeError, HandshakeOrchestrator, HandshakeOutcome, HandshakeStatus, InterruptHandle,
    Mode,
};
pub use application::session::{SessionError, SessionRecord};
pub use config::{ConfigError, TlsSettings};
pub use domain::{EngineCatalog, ProtocolVersion, ValidationError};
