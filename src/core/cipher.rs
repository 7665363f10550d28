//! Engine-side cipher state (RSA transformations used by key exchange
//! helpers). The key stays in the engine; only the handle crosses over.

use tracing::debug;

use crate::domain::EngineCatalog;
use crate::ports::{CipherHandle, EngineGateway, GatewayError, KeyHandle};

const CIPHER_SERVICE: &str = "Cipher";

pub struct EngineCipher<'g, G: EngineGateway + ?Sized> {
    gateway: &'g G,
    handle: CipherHandle,
    transformation: String,
}

impl<'g, G: EngineGateway + ?Sized> EngineCipher<'g, G> {
    /// # Errors
    /// * `GatewayError::Engine` naming the transformation when the provider
    ///   table has no such cipher.
    /// * Whatever the gateway reports on allocation.
    pub fn new(
        gateway: &'g G,
        catalog: &EngineCatalog,
        transformation: &str,
        encrypt: bool,
        key: KeyHandle,
    ) -> Result<Self, GatewayError> {
        let service = catalog
            .providers()
            .resolve(CIPHER_SERVICE, transformation)
            .ok_or_else(|| GatewayError::Engine(format!("unknown cipher {transformation}")))?;
        let handle = gateway.cipher_new(&service.algorithm, encrypt, key)?;
        debug!(requested = transformation, canonical = %service.algorithm, encrypt, "cipher started");
        Ok(Self {
            gateway,
            handle,
            transformation: service.algorithm.clone(),
        })
    }

    #[must_use]
    pub fn transformation(&self) -> &str {
        &self.transformation
    }

    /// # Errors
    /// Propagates engine failures.
    pub fn update(&mut self, input: &[u8]) -> Result<Vec<u8>, GatewayError> {
        self.gateway.cipher_update(self.handle, input)
    }

    /// # Errors
    /// Propagates engine failures.
    pub fn finish(self) -> Result<Vec<u8>, GatewayError> {
        self.gateway.cipher_final(self.handle)
    }
}

impl<G: EngineGateway + ?Sized> Drop for EngineCipher<'_, G> {
    fn drop(&mut self) {
        self.gateway.cipher_free(self.handle);
    }
}
