use core::time::Duration;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::errors::HandshakeError;
use super::fsm_types::{HandshakeEvent, HandshakeOutcome, HandshakeStatus, Mode, next_status};
use super::interrupt::{HandshakeShared, InterruptHandle};
use super::mediator::CallbackMediator;
use crate::application::session::SessionRecord;
use crate::core::handles::{ConnectionGuard, EngineContext, SessionGuard};
use crate::domain::{
    EngineCatalog, MODE_HANDSHAKE_CUTTHROUGH, OP_NO_TICKET, ProtocolVersion, ValidationError,
    VerifyMode,
};
use crate::ports::{
    CallbackError, ConnectionHandle, EngineGateway, GatewayError, HandshakeHandler,
    SessionHandle, TransportHandle,
};

const MAX_HOST_NAME_LEN: usize = 255;

/// Encode application protocol names to the length-prefixed wire list.
///
/// # Errors
/// [`ValidationError::BadApplicationProtocol`] for a name that is empty or
/// longer than 255 bytes.
pub fn encode_protocol_list<S: AsRef<str>>(names: &[S]) -> Result<Option<Vec<u8>>, ValidationError> {
    if names.is_empty() {
        return Ok(None);
    }
    let mut wire = Vec::new();
    for (index, name) in names.iter().enumerate() {
        let bytes = name.as_ref().as_bytes();
        let len = u8::try_from(bytes.len())
            .ok()
            .filter(|l| *l > 0)
            .ok_or(ValidationError::BadApplicationProtocol {
                index,
                len: bytes.len(),
            })?;
        wire.push(len);
        wire.extend_from_slice(bytes);
    }
    Ok(Some(wire))
}

pub(crate) fn check_host_name(host: &str) -> Result<(), ValidationError> {
    if host.is_empty() || host.len() > MAX_HOST_NAME_LEN || host.contains('\0') {
        return Err(ValidationError::BadHostName(host.to_owned()));
    }
    Ok(())
}

fn engine(e: GatewayError) -> HandshakeError {
    HandshakeError::Engine(e.to_string())
}

/// Drives one handshake on one connection against an [`EngineGateway`].
///
/// Configuration setters validate immediately and are applied to the engine
/// when `handshake` starts, so a rejected list never reaches the engine.
/// Server identity and session-creation settings go to the engine directly.
pub struct HandshakeOrchestrator<'c, G: EngineGateway + 'static> {
    catalog: &'c EngineCatalog,
    connection: ConnectionGuard<G>,
    shared: Arc<HandshakeShared>,
    cipher_list: Vec<String>,
    protocols: Vec<ProtocolVersion>,
    verify_mode: VerifyMode,
    host_name: Option<String>,
    cutthrough: bool,
    session_tickets: bool,
    io_timeout: Option<Duration>,
    mediator: Option<Arc<CallbackMediator<G>>>,
    transport: Option<TransportHandle>,
    session: Option<SessionRecord>,
    attached_session_id: Option<Vec<u8>>,
}

impl<'c, G: EngineGateway + 'static> HandshakeOrchestrator<'c, G> {
    /// Allocate a connection under `context`, preloaded with the catalog's
    /// default suites and protocols.
    ///
    /// # Errors
    /// * `HandshakeError::Engine` if the connection cannot be allocated.
    /// * `HandshakeError::Validation` if the catalog's defaults are
    ///   inconsistent with its own registry.
    pub fn new(
        context: Arc<EngineContext<G>>,
        catalog: &'c EngineCatalog,
    ) -> Result<Self, HandshakeError> {
        let cipher_list = catalog
            .cipher_suites()
            .translate_to_engine(&catalog.cipher_suites().default_suites())?;
        let connection = ConnectionGuard::new(context).map_err(engine)?;
        let gateway: Arc<dyn EngineGateway> = connection.gateway().clone();
        let shared = HandshakeShared::new(gateway, connection.handle());
        debug!(ssl = connection.handle().raw(), "connection allocated");
        Ok(Self {
            catalog,
            connection,
            shared,
            cipher_list,
            protocols: catalog.protocols().default_versions().to_vec(),
            verify_mode: VerifyMode::NONE,
            host_name: None,
            cutthrough: false,
            session_tickets: true,
            io_timeout: None,
            mediator: None,
            transport: None,
            session: None,
            attached_session_id: None,
        })
    }

    fn require_not_started(&self) -> Result<(), HandshakeError> {
        if self.status() == HandshakeStatus::NotStarted {
            Ok(())
        } else {
            Err(HandshakeError::InvalidState("connection already handshaking"))
        }
    }

    fn gateway(&self) -> &G {
        self.connection.gateway()
    }

    fn ssl(&self) -> ConnectionHandle {
        self.connection.handle()
    }

    #[must_use]
    pub fn catalog(&self) -> &'c EngineCatalog {
        self.catalog
    }

    #[must_use]
    pub fn status(&self) -> HandshakeStatus {
        self.shared.status()
    }

    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle::new(self.shared.clone())
    }

    #[must_use]
    pub fn connection_handle(&self) -> ConnectionHandle {
        self.ssl()
    }

    /// # Errors
    /// `Validation` when any entry is unknown; nothing is changed then.
    pub fn set_enabled_cipher_suites<S: AsRef<str>>(
        &mut self,
        names: &[S],
    ) -> Result<(), HandshakeError> {
        self.require_not_started()?;
        self.cipher_list = self.catalog.cipher_suites().translate_to_engine(names)?;
        debug!(count = self.cipher_list.len(), "cipher suites configured");
        Ok(())
    }

    /// Engine-native names that will be handed to the engine.
    #[must_use]
    pub fn engine_cipher_list(&self) -> &[String] {
        &self.cipher_list
    }

    /// # Errors
    /// `Validation` when any entry is unknown; nothing is changed then.
    pub fn set_enabled_protocols<S: AsRef<str>>(
        &mut self,
        names: &[S],
    ) -> Result<(), HandshakeError> {
        self.require_not_started()?;
        self.protocols = self.catalog.protocols().check_enabled(names)?;
        debug!(protocols = ?self.protocols, "protocols configured");
        Ok(())
    }

    #[must_use]
    pub fn enabled_protocols(&self) -> &[ProtocolVersion] {
        &self.protocols
    }

    /// # Errors
    /// `InvalidState` once the handshake has started.
    pub fn set_verify_mode(&mut self, mode: VerifyMode) -> Result<(), HandshakeError> {
        self.require_not_started()?;
        self.verify_mode = mode;
        Ok(())
    }

    /// SNI host name, sent in client mode only.
    ///
    /// # Errors
    /// `Validation` for an empty, oversized or NUL-containing name.
    pub fn set_host_name(&mut self, host: Option<&str>) -> Result<(), HandshakeError> {
        self.require_not_started()?;
        if let Some(h) = host {
            check_host_name(h)?;
        }
        self.host_name = host.map(str::to_owned);
        Ok(())
    }

    /// # Errors
    /// `InvalidState` once the handshake has started.
    pub fn set_cutthrough(&mut self, enabled: bool) -> Result<(), HandshakeError> {
        self.require_not_started()?;
        self.cutthrough = enabled;
        Ok(())
    }

    /// # Errors
    /// `InvalidState` once the handshake has started.
    pub fn set_session_tickets(&mut self, enabled: bool) -> Result<(), HandshakeError> {
        self.require_not_started()?;
        self.session_tickets = enabled;
        Ok(())
    }

    /// Deadline for post-handshake reads; `None` blocks.
    pub fn set_io_timeout(&mut self, timeout: Option<Duration>) {
        self.io_timeout = timeout;
    }

    pub fn set_session_creation_enabled(&mut self, enabled: bool) {
        self.gateway().set_session_creation_enabled(self.ssl(), enabled);
    }

    /// Server identity: DER chain, leaf first.
    ///
    /// # Errors
    /// `Engine` if the engine rejects the chain.
    pub fn use_certificate(&mut self, chain: &[Vec<u8>]) -> Result<(), HandshakeError> {
        self.require_not_started()?;
        self.gateway()
            .use_certificate(self.ssl(), chain)
            .map_err(engine)
    }

    /// Server identity key as PKCS#8; checked against the installed chain.
    ///
    /// # Errors
    /// `Engine` if the key is unparseable or does not match the certificate.
    pub fn use_private_key(&mut self, pkcs8: &[u8]) -> Result<(), HandshakeError> {
        self.require_not_started()?;
        self.gateway()
            .use_private_key(self.ssl(), pkcs8)
            .and_then(|()| self.gateway().check_private_key(self.ssl()))
            .map_err(engine)
    }

    /// Issuer names advertised when requesting a client certificate.
    ///
    /// # Errors
    /// `Engine` if the engine rejects a name.
    pub fn set_client_ca_list(&mut self, principals: &[Vec<u8>]) -> Result<(), HandshakeError> {
        self.require_not_started()?;
        self.gateway()
            .set_client_ca_list(self.ssl(), principals)
            .map_err(engine)
    }

    /// Hand an encoded prior session to the connection for resumption.
    pub(crate) fn attach_session(&mut self, encoded: &[u8], id: &[u8]) -> Result<(), HandshakeError> {
        self.require_not_started()?;
        let gateway = self.gateway();
        let handle = gateway.session_decode(encoded).map_err(engine)?;
        let guard = SessionGuard::new(gateway, handle);
        gateway.set_session(self.ssl(), guard.handle()).map_err(engine)?;
        drop(guard);
        self.attached_session_id = Some(id.to_vec());
        debug!("prior session attached for resumption");
        Ok(())
    }

    fn configure(&self, mode: Mode) -> Result<(), GatewayError> {
        let gw = self.gateway();
        let ssl = self.ssl();
        gw.set_cipher_list(ssl, &self.cipher_list)?;
        let bits = self.catalog.protocols().option_bits_for(&self.protocols);
        gw.set_options(ssl, bits.to_set);
        gw.clear_options(ssl, bits.to_clear);
        if self.session_tickets {
            gw.clear_options(ssl, OP_NO_TICKET);
        } else {
            gw.set_options(ssl, OP_NO_TICKET);
        }
        gw.set_verify_mode(ssl, self.verify_mode);
        if mode == Mode::Client {
            if let Some(host) = &self.host_name {
                gw.set_host_name(ssl, host)?;
            }
        }
        if self.cutthrough {
            gw.set_mode(ssl, MODE_HANDSHAKE_CUTTHROUGH);
        } else {
            gw.clear_mode(ssl, MODE_HANDSHAKE_CUTTHROUGH);
        }
        debug!(
            ?mode,
            to_set = bits.to_set,
            to_clear = bits.to_clear,
            verify = ?self.verify_mode,
            cutthrough = self.cutthrough,
            "engine configured"
        );
        Ok(())
    }

    fn advance(&self, ev: HandshakeEvent) -> HandshakeStatus {
        let current = self.status();
        match next_status(current, ev) {
            Some(next) => {
                debug!(from = ?current, to = ?next, event = ?ev, "handshake transition");
                self.shared.store_status(next);
                next
            }
            None => current,
        }
    }

    /// Run the handshake on the calling thread.
    ///
    /// `timeout` of zero blocks indefinitely. `protocols` are application
    /// protocol names offered (client) or accepted (server).
    ///
    /// # Errors
    /// * `InvalidState` on a second call.
    /// * `Validation` for a bad protocol name; the engine is untouched.
    /// * `Certificate` when the handler rejected the peer chain.
    /// * `Engine` for engine failures, `Session` if the result cannot be
    ///   captured.
    pub fn handshake<S: AsRef<str>>(
        &mut self,
        transport: TransportHandle,
        mode: Mode,
        timeout: Duration,
        protocols: &[S],
        handler: Arc<dyn HandshakeHandler>,
    ) -> Result<HandshakeOutcome, HandshakeError> {
        if next_status(self.status(), HandshakeEvent::Start).is_none() {
            return Err(HandshakeError::InvalidState("handshake already attempted"));
        }
        let wire_protocols = encode_protocol_list(protocols)?;
        self.advance(HandshakeEvent::Start);

        if let Err(e) = self.configure(mode) {
            self.advance(HandshakeEvent::EngineFailed);
            return Err(engine(e));
        }

        let mediator = Arc::new(CallbackMediator::new(
            mode,
            handler,
            self.shared.clone(),
            self.connection.gateway().clone(),
            self.ssl(),
        ));
        self.mediator = Some(mediator.clone());
        self.transport = Some(transport);

        let deadline = (!timeout.is_zero()).then_some(timeout);
        // Last checkpoint before the engine call. A request landing after it
        // was forwarded to the engine, which keeps it until its next return.
        if self.shared.interrupt_requested() {
            self.advance(HandshakeEvent::InterruptObserved);
            return Ok(HandshakeOutcome::Interrupted);
        }
        let result = self.gateway().do_handshake(
            self.ssl(),
            transport,
            mediator.as_ref(),
            deadline,
            mode == Mode::Client,
            wire_protocols.as_deref(),
        );

        match result {
            Ok(handle) => self.finish_success(handle, &mediator),
            Err(e) => self.finish_failure(e, &mediator),
        }
    }

    fn finish_success(
        &mut self,
        handle: SessionHandle,
        mediator: &CallbackMediator<G>,
    ) -> Result<HandshakeOutcome, HandshakeError> {
        if let Some(reason) = mediator.rejection() {
            // Engine claimed success after the chain was refused.
            drop(SessionGuard::new(self.gateway(), handle));
            self.advance(HandshakeEvent::CertificateRejected);
            return Err(HandshakeError::Certificate(reason));
        }
        // Succeeds if completion was already forwarded; from here on
        // interrupt requests are refused.
        if !self.shared.settle() {
            drop(SessionGuard::new(self.gateway(), handle));
            self.advance(HandshakeEvent::InterruptObserved);
            return Ok(HandshakeOutcome::Interrupted);
        }
        let record = match SessionRecord::capture_from_handshake(self.gateway(), self.catalog, handle) {
            Ok(r) => r,
            Err(e) => {
                self.advance(HandshakeEvent::EngineFailed);
                return Err(e.into());
            }
        };
        self.advance(HandshakeEvent::EngineSucceeded);
        if !self.cutthrough && !mediator.completion_signalled() {
            mediator.signal_completion();
        }
        let resumed = self.was_resumed_with(&record);
        info!(
            session = %record.fingerprint(),
            protocol = %record.protocol(),
            cipher = record.cipher_suite(),
            resumed,
            "handshake completed"
        );
        self.session = Some(record.clone());
        Ok(HandshakeOutcome::Completed(record))
    }

    fn finish_failure(
        &mut self,
        err: GatewayError,
        mediator: &CallbackMediator<G>,
    ) -> Result<HandshakeOutcome, HandshakeError> {
        if let Some(reason) = mediator.rejection() {
            self.advance(HandshakeEvent::CertificateRejected);
            return Err(HandshakeError::Certificate(reason));
        }
        // An interrupted engine call often surfaces as a timeout or a plain
        // I/O error, so an accepted request outranks the engine's reason.
        if self.shared.interrupt_requested() {
            debug!(error = %err, "engine error after interrupt request");
            self.advance(HandshakeEvent::InterruptObserved);
            return Ok(HandshakeOutcome::Interrupted);
        }
        match err {
            GatewayError::Callback(CallbackError::CertificateRejected(reason)) => {
                self.advance(HandshakeEvent::CertificateRejected);
                Err(HandshakeError::Certificate(reason))
            }
            GatewayError::Timeout => {
                warn!(ssl = self.ssl().raw(), "handshake timed out");
                self.advance(HandshakeEvent::DeadlineExpired);
                Ok(HandshakeOutcome::TimedOut)
            }
            GatewayError::Interrupted | GatewayError::Callback(CallbackError::Interrupted) => {
                self.advance(HandshakeEvent::InterruptObserved);
                Ok(HandshakeOutcome::Interrupted)
            }
            other => {
                warn!(error = %other, "handshake failed");
                self.advance(HandshakeEvent::EngineFailed);
                Err(engine(other))
            }
        }
    }

    fn was_resumed_with(&self, record: &SessionRecord) -> bool {
        self.attached_session_id
            .as_deref()
            .is_some_and(|id| id == record.id())
    }

    fn established(&self) -> Result<(&CallbackMediator<G>, TransportHandle), HandshakeError> {
        if self.status() != HandshakeStatus::Completed {
            return Err(HandshakeError::InvalidState("handshake not completed"));
        }
        match (&self.mediator, self.transport) {
            (Some(m), Some(t)) => Ok((m.as_ref(), t)),
            _ => Err(HandshakeError::InvalidState("handshake not completed")),
        }
    }

    /// # Errors
    /// `InvalidState` before completion, `Engine` on engine failure or
    /// read timeout.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, HandshakeError> {
        let (mediator, transport) = self.established()?;
        self.gateway()
            .read(self.ssl(), transport, buf, mediator, self.io_timeout)
            .map_err(engine)
    }

    /// # Errors
    /// `InvalidState` before completion, `Engine` on engine failure.
    pub fn write(&self, data: &[u8]) -> Result<(), HandshakeError> {
        let (mediator, transport) = self.established()?;
        self.gateway()
            .write(self.ssl(), transport, data, mediator)
            .map_err(engine)
    }

    /// # Errors
    /// `InvalidState` before completion, `Engine` if refused.
    pub fn renegotiate(&mut self) -> Result<(), HandshakeError> {
        self.established()?;
        self.gateway().renegotiate(self.ssl()).map_err(engine)
    }

    /// # Errors
    /// `InvalidState` before completion, `Engine` if the close notify fails.
    pub fn shutdown(&mut self) -> Result<(), HandshakeError> {
        let (mediator, transport) = self.established()?;
        self.gateway()
            .shutdown(self.ssl(), transport, mediator)
            .map_err(engine)
    }

    /// Negotiated application protocol, if any.
    #[must_use]
    pub fn negotiated_protocol(&self) -> Option<String> {
        self.gateway()
            .negotiated_protocol(self.ssl())
            .and_then(|p| String::from_utf8(p).ok())
    }

    #[must_use]
    pub fn peer_certificate_chain(&self) -> Vec<Vec<u8>> {
        self.gateway().peer_certificate_chain(self.ssl())
    }

    #[must_use]
    pub fn local_certificate_chain(&self) -> Vec<Vec<u8>> {
        self.gateway().local_certificate_chain(self.ssl())
    }

    #[must_use]
    pub fn session(&self) -> Option<&SessionRecord> {
        self.session.as_ref()
    }

    /// Whether the completed session reused the attached one.
    #[must_use]
    pub fn was_resumed(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| self.was_resumed_with(s))
    }

    /// Whether the handler has been told the handshake completed.
    #[must_use]
    pub fn completion_signalled(&self) -> bool {
        self.mediator
            .as_ref()
            .is_some_and(|m| m.completion_signalled())
    }
}
