//! Bridge between engine callbacks and the caller's handler.
//!
//! One mediator lives for the whole connection: the handshake creates it and
//! post-handshake I/O reuses it, so a completion signal deferred by
//! cutthrough still reaches the handler exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::fsm_types::Mode;
use super::interrupt::HandshakeShared;
use crate::domain::ClientCertificateType;
use crate::ports::{
    CallbackError, ClientCredentials, ConnectionHandle, EngineGateway, GatewayError,
    HandshakeCallbacks, HandshakeHandler, PrivateKey,
};

pub(crate) struct CallbackMediator<G: EngineGateway + ?Sized> {
    mode: Mode,
    handler: Arc<dyn HandshakeHandler>,
    shared: Arc<HandshakeShared>,
    gateway: Arc<G>,
    ssl: ConnectionHandle,
    completed: AtomicBool,
    rejection: Mutex<Option<String>>,
}

fn side_channel(e: GatewayError) -> CallbackError {
    CallbackError::Engine(e.to_string())
}

impl<G: EngineGateway + ?Sized> CallbackMediator<G> {
    pub(crate) fn new(
        mode: Mode,
        handler: Arc<dyn HandshakeHandler>,
        shared: Arc<HandshakeShared>,
        gateway: Arc<G>,
        ssl: ConnectionHandle,
    ) -> Self {
        Self {
            mode,
            handler,
            shared,
            gateway,
            ssl,
            completed: AtomicBool::new(false),
            rejection: Mutex::new(None),
        }
    }

    /// Reason recorded by a failed chain verification, if any.
    pub(crate) fn rejection(&self) -> Option<String> {
        self.rejection.lock().clone()
    }

    pub(crate) fn completion_signalled(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Forward completion to the handler unless it was already forwarded,
    /// the peer chain was rejected, or an interrupt was accepted first.
    pub(crate) fn signal_completion(&self) {
        if self.rejection.lock().is_some() {
            warn!("completion after certificate rejection dropped");
            return;
        }
        if !self.shared.settle() {
            debug!(ssl = self.ssl.raw(), "completion suppressed by pending interrupt");
            return;
        }
        if self.completed.swap(true, Ordering::SeqCst) {
            warn!("duplicate handshake completion signal dropped");
            return;
        }
        debug!(ssl = self.ssl.raw(), "handshake completion forwarded");
        self.handler.handshake_completed();
    }

    fn checkpoint(&self) -> Result<(), CallbackError> {
        if self.shared.interrupt_requested() {
            debug!(ssl = self.ssl.raw(), "interrupt observed in callback");
            return Err(CallbackError::Interrupted);
        }
        Ok(())
    }

    fn install(&self, creds: ClientCredentials) -> Result<(), CallbackError> {
        let ClientCredentials {
            certificate_chain,
            private_key,
        } = creds;
        let installed = self
            .gateway
            .use_certificate(self.ssl, &certificate_chain)
            .and_then(|()| match &private_key {
                PrivateKey::Pkcs8(der) => self.gateway.use_private_key(self.ssl, der),
                PrivateKey::Engine(key) => self.gateway.use_private_key_handle(self.ssl, *key),
            })
            .and_then(|()| self.gateway.check_private_key(self.ssl));
        // The connection holds its own key reference once installed.
        if let PrivateKey::Engine(key) = private_key {
            self.gateway.key_free(key);
        }
        installed.map_err(side_channel)
    }
}

impl<G: EngineGateway + ?Sized> HandshakeCallbacks for CallbackMediator<G> {
    fn verify_certificate_chain(
        &self,
        chain: &[Vec<u8>],
        auth_method: &str,
    ) -> Result<(), CallbackError> {
        self.checkpoint()?;
        debug!(len = chain.len(), auth_method, "verifying peer chain");
        if let Err(rejection) = self.handler.verify(chain, auth_method) {
            warn!(reason = %rejection, "peer certificate chain rejected");
            let reason = rejection.reason;
            *self.rejection.lock() = Some(reason.clone());
            return Err(CallbackError::CertificateRejected(reason));
        }
        Ok(())
    }

    fn client_certificate_requested(
        &self,
        key_types: &[u8],
        issuers: &[Vec<u8>],
    ) -> Result<(), CallbackError> {
        self.checkpoint()?;
        if self.mode == Mode::Server {
            debug!("certificate request ignored in server mode");
            return Ok(());
        }
        let types = ClientCertificateType::decode_all(key_types);
        match self.handler.select_client_credentials(&types, issuers) {
            Some(creds) => {
                debug!(chain_len = creds.certificate_chain.len(), "installing client credentials");
                self.install(creds)
            }
            None => {
                debug!("no client credentials; continuing anonymously");
                Ok(())
            }
        }
    }

    fn handshake_completed(&self) -> Result<(), CallbackError> {
        self.checkpoint()?;
        self.signal_completion();
        Ok(())
    }
}
