//! Handler doubles for handshake tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::domain::ClientCertificateType;
use crate::ports::{CertificateRejection, ClientCredentials, HandshakeHandler, KeyHandle, PrivateKey};

/// What a [`RecordingHandler`] does when asked for client credentials.
#[derive(Debug, Clone, Default)]
pub enum CredentialChoice {
    #[default]
    Decline,
    Pkcs8 {
        chain: Vec<Vec<u8>>,
        key: Vec<u8>,
    },
    EngineKey {
        chain: Vec<Vec<u8>>,
        key: KeyHandle,
    },
}

/// Counts every call and answers according to its configuration.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    /// `Some(reason)` rejects every chain.
    pub reject_with: Option<String>,
    pub credentials: CredentialChoice,
    pub verify_calls: AtomicUsize,
    pub completions: AtomicUsize,
    pub requested_types: Mutex<Vec<ClientCertificateType>>,
    pub seen_chain: Mutex<Vec<Vec<u8>>>,
}

impl RecordingHandler {
    #[must_use]
    pub fn trusting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn rejecting(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            reject_with: Some(reason.to_owned()),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn offering(credentials: CredentialChoice) -> Arc<Self> {
        Arc::new(Self {
            credentials,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

impl HandshakeHandler for RecordingHandler {
    fn verify(&self, chain: &[Vec<u8>], _auth_method: &str) -> Result<(), CertificateRejection> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_chain.lock() = chain.to_vec();
        match &self.reject_with {
            Some(reason) => Err(CertificateRejection::new(reason.clone())),
            None => Ok(()),
        }
    }

    fn select_client_credentials(
        &self,
        key_types: &[ClientCertificateType],
        _issuers: &[Vec<u8>],
    ) -> Option<ClientCredentials> {
        *self.requested_types.lock() = key_types.to_vec();
        match &self.credentials {
            CredentialChoice::Decline => None,
            CredentialChoice::Pkcs8 { chain, key } => {
                Some(ClientCredentials::pkcs8(chain.clone(), key.clone()))
            }
            CredentialChoice::EngineKey { chain, key } => Some(ClientCredentials {
                certificate_chain: chain.clone(),
                private_key: PrivateKey::Engine(*key),
            }),
        }
    }

    fn handshake_completed(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}
