//! Handshake callback contracts.
//!
//! Two traits sit on either side of the orchestrator:
//! * [`HandshakeCallbacks`] is what the engine adapter invokes synchronously
//!   from inside a blocking gateway call. The orchestrator implements it.
//! * [`HandshakeHandler`] is what the caller supplies per handshake: the
//!   certificate validator, an optional client credential source and a
//!   completion listener.

use core::fmt;

use zeroize::Zeroizing;

use crate::domain::ClientCertificateType;
use crate::ports::gateway::KeyHandle;

/// Why a callback asked the engine to abort.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    #[error("peer certificate chain rejected: {0}")]
    CertificateRejected(String),
    #[error("interrupted")]
    Interrupted,
    #[error("engine side-channel call failed: {0}")]
    Engine(String),
}

/// Engine-facing capability set.
pub trait HandshakeCallbacks: Send + Sync {
    /// `chain` is DER, leaf first. `auth_method` is the key exchange name the
    /// engine reports (e.g. `"ECDHE_RSA"`).
    ///
    /// # Errors
    /// Returning an error makes the engine abort the handshake.
    fn verify_certificate_chain(
        &self,
        chain: &[Vec<u8>],
        auth_method: &str,
    ) -> Result<(), CallbackError>;

    /// `key_types` are raw certificate type codes; `issuers` DER names.
    ///
    /// # Errors
    /// Returning an error makes the engine abort the handshake.
    fn client_certificate_requested(
        &self,
        key_types: &[u8],
        issuers: &[Vec<u8>],
    ) -> Result<(), CallbackError>;

    /// May arrive before or after the blocking call returns.
    ///
    /// # Errors
    /// Returning an error makes the engine abort the current call.
    fn handshake_completed(&self) -> Result<(), CallbackError>;
}

/// A validator's refusal of a peer chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRejection {
    pub reason: String,
}

impl CertificateRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CertificateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Private key material handed to the engine.
pub enum PrivateKey {
    /// PKCS#8 DER; wiped when dropped.
    Pkcs8(Zeroizing<Vec<u8>>),
    /// A key already living inside the engine.
    Engine(KeyHandle),
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKey::Pkcs8(bytes) => write!(f, "Pkcs8(<{} bytes redacted>)", bytes.len()),
            PrivateKey::Engine(h) => f.debug_tuple("Engine").field(h).finish(),
        }
    }
}

/// Certificate chain plus key offered in response to a certificate request.
#[derive(Debug)]
pub struct ClientCredentials {
    /// DER certificates, leaf first.
    pub certificate_chain: Vec<Vec<u8>>,
    pub private_key: PrivateKey,
}

impl ClientCredentials {
    #[must_use]
    pub fn pkcs8(certificate_chain: Vec<Vec<u8>>, key: Vec<u8>) -> Self {
        Self {
            certificate_chain,
            private_key: PrivateKey::Pkcs8(Zeroizing::new(key)),
        }
    }
}

/// Caller-supplied handshake collaborator.
pub trait HandshakeHandler: Send + Sync {
    /// Decide whether the peer chain is trusted.
    ///
    /// # Errors
    /// A [`CertificateRejection`] fails the handshake.
    fn verify(&self, chain: &[Vec<u8>], auth_method: &str) -> Result<(), CertificateRejection>;

    /// Pick credentials for a server's certificate request. `None` continues
    /// anonymously.
    fn select_client_credentials(
        &self,
        _key_types: &[ClientCertificateType],
        _issuers: &[Vec<u8>],
    ) -> Option<ClientCredentials> {
        None
    }

    fn handshake_completed(&self) {}
}
