use thiserror::Error;

/// ---- Domain error type (idiomatic, typed) ----
/// Rejected caller input. Every list is checked in full before anything is
/// handed to the engine, so a `ValidationError` never leaves partial state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// An entry was empty (the caller's equivalent of a null element).
    #[error("{list}[{index}] is missing")]
    MissingEntry { list: &'static str, index: usize },
    /// Cipher suite is neither a standard name, an engine name nor the SCSV.
    #[error("cipher suite {name} at index {index} is not supported")]
    UnsupportedCipherSuite { name: String, index: usize },
    /// Protocol name outside the supported set.
    #[error("protocol {name} at index {index} is not supported")]
    UnsupportedProtocol { name: String, index: usize },
    /// Registry table would break the standard/engine bijection.
    #[error("duplicate {column} name {name} in cipher suite table")]
    DuplicateSuite { column: &'static str, name: String },
    /// Default list references a suite that is not registered.
    #[error("default cipher suite {name} is not registered")]
    UnknownDefault { name: String },
    /// Application protocol names go on the wire with a one byte length.
    #[error("application protocol at index {index} must be 1..=255 bytes, got {len}")]
    BadApplicationProtocol { index: usize, len: usize },
    /// Host name used for SNI.
    #[error("host name {0:?} is not usable for server name indication")]
    BadHostName(String),
}
