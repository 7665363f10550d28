/*
Naming and policy tables for the engine bridge.

Nothing here talks to the engine. Everything is a frozen table plus pure
functions over it, so the whole module is safe to share read-only between
threads once built:

* `cipher_suite` – standard ↔ engine suite names, default/supported lists.
* `protocol` – protocol versions and their engine disable bits.
* `engine_flags` – verify mode, option and mode words, certificate types.
* `provider` – provider service/alias table.
* `catalog` – the bundle handed to the application layer.
*/

pub mod catalog;
pub mod cipher_suite;
pub mod engine_flags;
pub mod errors;
pub mod protocol;
pub mod provider;

pub use catalog::EngineCatalog;
pub use cipher_suite::{CipherSuite, CipherSuiteRegistry, TLS_EMPTY_RENEGOTIATION_INFO_SCSV};
pub use engine_flags::{
    ClientCertificateType, MODE_HANDSHAKE_CUTTHROUGH, OP_NO_SESSION_RESUMPTION_ON_RENEGOTIATION,
    OP_NO_TICKET, VerifyMode,
};
pub use errors::ValidationError;
pub use protocol::{OptionBits, ProtocolPolicy, ProtocolVersion};
pub use provider::{ProviderService, ProviderTable};
