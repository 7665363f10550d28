//! Message digests computed by the engine.
//!
//! Algorithm names go through the provider table first, so callers may use
//! any registered alias (`"SHA256"`, an OID, ...) and the engine only ever
//! sees canonical names.

use tracing::debug;

use crate::domain::EngineCatalog;
use crate::ports::{DigestHandle, EngineGateway, GatewayError};

const DIGEST_SERVICE: &str = "MessageDigest";

/// One digest computation; the engine state is freed on drop.
pub struct EngineDigest<'g, G: EngineGateway + ?Sized> {
    gateway: &'g G,
    handle: DigestHandle,
    algorithm: String,
}

impl<'g, G: EngineGateway + ?Sized> EngineDigest<'g, G> {
    /// # Errors
    /// * `GatewayError::Engine` naming the algorithm when the provider table
    ///   has no such digest.
    /// * Whatever the gateway reports on allocation.
    pub fn new(
        gateway: &'g G,
        catalog: &EngineCatalog,
        algorithm: &str,
    ) -> Result<Self, GatewayError> {
        let service = catalog
            .providers()
            .resolve(DIGEST_SERVICE, algorithm)
            .ok_or_else(|| GatewayError::Engine(format!("unknown digest algorithm {algorithm}")))?;
        let handle = gateway.digest_new(&service.algorithm)?;
        debug!(requested = algorithm, canonical = %service.algorithm, "digest started");
        Ok(Self {
            gateway,
            handle,
            algorithm: service.algorithm.clone(),
        })
    }

    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// # Errors
    /// Propagates engine failures.
    pub fn update(&mut self, data: &[u8]) -> Result<(), GatewayError> {
        self.gateway.digest_update(self.handle, data)
    }

    /// # Errors
    /// Propagates engine failures.
    pub fn finish(self) -> Result<Vec<u8>, GatewayError> {
        self.gateway.digest_final(self.handle)
    }
}

impl<G: EngineGateway + ?Sized> Drop for EngineDigest<'_, G> {
    fn drop(&mut self) {
        self.gateway.digest_free(self.handle);
    }
}
