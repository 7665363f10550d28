//! Scripted in-memory engine.
//!
//! Every handle it hands out is tracked until freed, so tests can assert that
//! nothing leaked. Configuration calls are recorded per connection. The
//! handshake follows a [`HandshakeScript`] and drives the supplied callbacks
//! the way a real engine would, outside of any internal lock.

use core::time::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::domain::VerifyMode;
use crate::ports::{
    CipherHandle, ConnectionHandle, ContextHandle, DigestHandle, EngineGateway, GatewayError,
    HandshakeCallbacks, KeyHandle, SessionHandle, TransportHandle,
};

/// What the engine reports about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionScript {
    pub id: Vec<u8>,
    pub time_millis: i64,
    pub version: String,
    pub cipher: String,
    pub encoded: Vec<u8>,
}

impl Default for SessionScript {
    fn default() -> Self {
        Self {
            id: vec![0xAB; 32],
            time_millis: 1_700_000_000_000,
            version: "TLSv1.2".into(),
            cipher: "ECDHE-RSA-AES128-SHA".into(),
            encoded: b"engine-session-v1".to_vec(),
        }
    }
}

/// When the engine reports completion to the callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    BeforeReturn,
    /// Cutthrough: deferred until the first read or write.
    OnFirstIo,
    Never,
    /// A misbehaving engine signalling twice before returning.
    Twice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResult {
    Succeed,
    Fail(String),
    Timeout,
    /// Park inside the handshake until `interrupt` is called.
    BlockUntilInterrupted,
}

#[derive(Debug, Clone)]
pub struct HandshakeScript {
    /// Offered to `verify_certificate_chain` when present.
    pub peer_chain: Option<Vec<Vec<u8>>>,
    pub auth_method: String,
    /// Keep going after a failed verification callback.
    pub ignore_verify_failure: bool,
    /// `(key type codes, issuers)` for a certificate request.
    pub certificate_request: Option<(Vec<u8>, Vec<Vec<u8>>)>,
    pub completion: Completion,
    pub result: ScriptedResult,
    pub session: SessionScript,
    /// Reuse an attached session the engine issued earlier.
    pub resume_offered: bool,
    pub negotiated_protocol: Option<Vec<u8>>,
    pub inbound: Vec<u8>,
}

impl Default for HandshakeScript {
    fn default() -> Self {
        Self {
            peer_chain: Some(vec![b"leaf-cert".to_vec(), b"root-cert".to_vec()]),
            auth_method: "ECDHE_RSA".into(),
            ignore_verify_failure: false,
            certificate_request: None,
            completion: Completion::BeforeReturn,
            result: ScriptedResult::Succeed,
            session: SessionScript::default(),
            resume_offered: true,
            negotiated_protocol: None,
            inbound: b"hello".to_vec(),
        }
    }
}

/// Configuration observed on one connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRecord {
    pub options: u64,
    pub mode: u64,
    pub cipher_list: Option<Vec<String>>,
    pub verify_mode: Option<VerifyMode>,
    pub host_name: Option<String>,
    pub attached_session: Option<Vec<u8>>,
    pub session_creation: Option<bool>,
    pub certificate_chain: Vec<Vec<u8>>,
    pub private_key: Option<Vec<u8>>,
    pub key_handle: Option<KeyHandle>,
    pub key_checks: usize,
    pub client_cas: Vec<Vec<u8>>,
    pub handshake_calls: usize,
    pub last_timeout: Option<Option<Duration>>,
    pub last_client_mode: Option<bool>,
    pub last_protocols: Option<Vec<u8>>,
    pub written: Vec<u8>,
    pub renegotiations: usize,
    pub shutdowns: usize,
    pub completion_pending: bool,
    pub inbound: Vec<u8>,
    pub negotiated_protocol: Option<Vec<u8>>,
}

#[derive(Default)]
struct Inner {
    script: HandshakeScript,
    contexts: HashSet<u64>,
    context_sid: HashMap<u64, Vec<u8>>,
    connections: HashMap<u64, ConnectionRecord>,
    sessions: HashMap<u64, SessionScript>,
    issued: HashMap<Vec<u8>, SessionScript>,
    keys: HashSet<u64>,
    digests: HashMap<u64, (String, Vec<u8>)>,
    ciphers: HashMap<u64, (String, bool, Vec<u8>)>,
    blocked: HashSet<u64>,
    interrupted: HashSet<u64>,
    interrupt_calls: usize,
    fail_cipher_list: bool,
}

pub struct ScriptedGateway {
    inner: Mutex<Inner>,
    cv: Condvar,
    next: AtomicU64,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown(what: &str) -> GatewayError {
    GatewayError::Engine(format!("unknown {what} handle"))
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::with_script(HandshakeScript::default())
    }

    #[must_use]
    pub fn with_script(script: HandshakeScript) -> Self {
        Self {
            inner: Mutex::new(Inner {
                script,
                ..Inner::default()
            }),
            cv: Condvar::new(),
            next: AtomicU64::new(1),
        }
    }

    fn fresh(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn set_script(&self, script: HandshakeScript) {
        self.inner.lock().script = script;
    }

    pub fn fail_cipher_list(&self, fail: bool) {
        self.inner.lock().fail_cipher_list = fail;
    }

    /// Register a session as if the engine had produced it.
    pub fn make_session(&self, script: &SessionScript) -> SessionHandle {
        let h = self.fresh();
        let mut g = self.inner.lock();
        g.issued.insert(script.encoded.clone(), script.clone());
        g.sessions.insert(h, script.clone());
        SessionHandle(h)
    }

    /// Hand out an engine key handle for credential tests.
    pub fn make_key(&self) -> KeyHandle {
        let h = self.fresh();
        self.inner.lock().keys.insert(h);
        KeyHandle(h)
    }

    #[must_use]
    pub fn connection(&self, ssl: ConnectionHandle) -> Option<ConnectionRecord> {
        self.inner.lock().connections.get(&ssl.0).cloned()
    }

    #[must_use]
    pub fn session_id_context(&self, ctx: ContextHandle) -> Option<Vec<u8>> {
        self.inner.lock().context_sid.get(&ctx.0).cloned()
    }

    /// Block until a handshake on `ssl` is parked waiting for an interrupt.
    pub fn wait_until_blocked(&self, ssl: ConnectionHandle) {
        let mut g = self.inner.lock();
        while !g.blocked.contains(&ssl.0) {
            self.cv.wait(&mut g);
        }
    }

    #[must_use]
    pub fn interrupt_calls(&self) -> usize {
        self.inner.lock().interrupt_calls
    }

    #[must_use]
    pub fn live_contexts(&self) -> usize {
        self.inner.lock().contexts.len()
    }

    #[must_use]
    pub fn live_connections(&self) -> usize {
        self.inner.lock().connections.len()
    }

    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    #[must_use]
    pub fn live_keys(&self) -> usize {
        self.inner.lock().keys.len()
    }

    #[must_use]
    pub fn live_digests(&self) -> usize {
        self.inner.lock().digests.len()
    }

    #[must_use]
    pub fn live_ciphers(&self) -> usize {
        self.inner.lock().ciphers.len()
    }

    /// # Panics
    /// If any handle is still live.
    pub fn assert_no_leaks(&self) {
        let g = self.inner.lock();
        assert!(g.contexts.is_empty(), "leaked contexts: {:?}", g.contexts);
        assert!(g.connections.is_empty(), "leaked connections: {}", g.connections.len());
        assert!(g.sessions.is_empty(), "leaked sessions: {}", g.sessions.len());
        assert!(g.keys.is_empty(), "leaked keys: {:?}", g.keys);
        assert!(g.digests.is_empty(), "leaked digests: {}", g.digests.len());
        assert!(g.ciphers.is_empty(), "leaked ciphers: {}", g.ciphers.len());
    }

    fn with_conn<T>(
        &self,
        ssl: ConnectionHandle,
        f: impl FnOnce(&mut ConnectionRecord) -> T,
    ) -> Result<T, GatewayError> {
        let mut g = self.inner.lock();
        g.connections
            .get_mut(&ssl.0)
            .map(f)
            .ok_or_else(|| unknown("connection"))
    }

    fn flush_pending_completion(
        &self,
        ssl: ConnectionHandle,
        callbacks: &dyn HandshakeCallbacks,
    ) -> Result<(), GatewayError> {
        let pending = self.with_conn(ssl, |c| std::mem::take(&mut c.completion_pending))?;
        if pending {
            callbacks.handshake_completed()?;
        }
        Ok(())
    }
}

impl EngineGateway for ScriptedGateway {
    fn context_new(&self) -> Result<ContextHandle, GatewayError> {
        let h = self.fresh();
        self.inner.lock().contexts.insert(h);
        Ok(ContextHandle(h))
    }

    fn context_free(&self, ctx: ContextHandle) {
        let mut g = self.inner.lock();
        assert!(g.contexts.remove(&ctx.0), "double free of context {}", ctx.0);
        g.context_sid.remove(&ctx.0);
    }

    fn connection_new(&self, ctx: ContextHandle) -> Result<ConnectionHandle, GatewayError> {
        let h = self.fresh();
        let mut g = self.inner.lock();
        if !g.contexts.contains(&ctx.0) {
            return Err(unknown("context"));
        }
        g.connections.insert(h, ConnectionRecord::default());
        Ok(ConnectionHandle(h))
    }

    fn connection_free(&self, ssl: ConnectionHandle) {
        let removed = self.inner.lock().connections.remove(&ssl.0);
        assert!(removed.is_some(), "double free of connection {}", ssl.0);
    }

    fn session_free(&self, session: SessionHandle) {
        let removed = self.inner.lock().sessions.remove(&session.0);
        assert!(removed.is_some(), "double free of session {}", session.0);
    }

    fn key_free(&self, key: KeyHandle) {
        assert!(self.inner.lock().keys.remove(&key.0), "double free of key {}", key.0);
    }

    fn set_session_id_context(&self, ctx: ContextHandle, sid_ctx: &[u8]) -> Result<(), GatewayError> {
        if sid_ctx.len() > 32 {
            return Err(GatewayError::Engine("session id context too long".into()));
        }
        let mut g = self.inner.lock();
        if !g.contexts.contains(&ctx.0) {
            return Err(unknown("context"));
        }
        g.context_sid.insert(ctx.0, sid_ctx.to_vec());
        Ok(())
    }

    fn set_verify_mode(&self, ssl: ConnectionHandle, mode: VerifyMode) {
        let _ = self.with_conn(ssl, |c| c.verify_mode = Some(mode));
    }

    fn options(&self, ssl: ConnectionHandle) -> u64 {
        self.with_conn(ssl, |c| c.options).unwrap_or(0)
    }

    fn set_options(&self, ssl: ConnectionHandle, bits: u64) -> u64 {
        self.with_conn(ssl, |c| {
            c.options |= bits;
            c.options
        })
        .unwrap_or(0)
    }

    fn clear_options(&self, ssl: ConnectionHandle, bits: u64) -> u64 {
        self.with_conn(ssl, |c| {
            c.options &= !bits;
            c.options
        })
        .unwrap_or(0)
    }

    fn mode(&self, ssl: ConnectionHandle) -> u64 {
        self.with_conn(ssl, |c| c.mode).unwrap_or(0)
    }

    fn set_mode(&self, ssl: ConnectionHandle, bits: u64) -> u64 {
        self.with_conn(ssl, |c| {
            c.mode |= bits;
            c.mode
        })
        .unwrap_or(0)
    }

    fn clear_mode(&self, ssl: ConnectionHandle, bits: u64) -> u64 {
        self.with_conn(ssl, |c| {
            c.mode &= !bits;
            c.mode
        })
        .unwrap_or(0)
    }

    fn set_cipher_list(&self, ssl: ConnectionHandle, engine_names: &[String]) -> Result<(), GatewayError> {
        if self.inner.lock().fail_cipher_list {
            return Err(GatewayError::Engine("no cipher match".into()));
        }
        self.with_conn(ssl, |c| c.cipher_list = Some(engine_names.to_vec()))
    }

    fn set_host_name(&self, ssl: ConnectionHandle, host: &str) -> Result<(), GatewayError> {
        self.with_conn(ssl, |c| c.host_name = Some(host.to_owned()))
    }

    fn set_session(&self, ssl: ConnectionHandle, session: SessionHandle) -> Result<(), GatewayError> {
        let mut g = self.inner.lock();
        let encoded = g
            .sessions
            .get(&session.0)
            .map(|s| s.encoded.clone())
            .ok_or_else(|| unknown("session"))?;
        let conn = g.connections.get_mut(&ssl.0).ok_or_else(|| unknown("connection"))?;
        conn.attached_session = Some(encoded);
        Ok(())
    }

    fn set_session_creation_enabled(&self, ssl: ConnectionHandle, enabled: bool) {
        let _ = self.with_conn(ssl, |c| c.session_creation = Some(enabled));
    }

    fn use_certificate(&self, ssl: ConnectionHandle, chain: &[Vec<u8>]) -> Result<(), GatewayError> {
        if chain.is_empty() {
            return Err(GatewayError::Engine("empty certificate chain".into()));
        }
        self.with_conn(ssl, |c| c.certificate_chain = chain.to_vec())
    }

    fn use_private_key(&self, ssl: ConnectionHandle, pkcs8: &[u8]) -> Result<(), GatewayError> {
        if pkcs8.is_empty() {
            return Err(GatewayError::Engine("unparseable private key".into()));
        }
        self.with_conn(ssl, |c| c.private_key = Some(pkcs8.to_vec()))
    }

    fn use_private_key_handle(&self, ssl: ConnectionHandle, key: KeyHandle) -> Result<(), GatewayError> {
        if !self.inner.lock().keys.contains(&key.0) {
            return Err(unknown("key"));
        }
        self.with_conn(ssl, |c| c.key_handle = Some(key))
    }

    fn check_private_key(&self, ssl: ConnectionHandle) -> Result<(), GatewayError> {
        self.with_conn(ssl, |c| {
            c.key_checks += 1;
            !c.certificate_chain.is_empty() && (c.private_key.is_some() || c.key_handle.is_some())
        })?
        .then_some(())
        .ok_or_else(|| GatewayError::Engine("private key does not match certificate".into()))
    }

    fn set_client_ca_list(&self, ssl: ConnectionHandle, principals: &[Vec<u8>]) -> Result<(), GatewayError> {
        self.with_conn(ssl, |c| c.client_cas = principals.to_vec())
    }

    fn do_handshake(
        &self,
        ssl: ConnectionHandle,
        _transport: TransportHandle,
        callbacks: &dyn HandshakeCallbacks,
        timeout: Option<Duration>,
        client_mode: bool,
        protocols: Option<&[u8]>,
    ) -> Result<SessionHandle, GatewayError> {
        let script = self.inner.lock().script.clone();
        self.with_conn(ssl, |c| {
            c.handshake_calls += 1;
            c.last_timeout = Some(timeout);
            c.last_client_mode = Some(client_mode);
            c.last_protocols = protocols.map(<[u8]>::to_vec);
        })?;

        if let Some(chain) = &script.peer_chain {
            if let Err(e) = callbacks.verify_certificate_chain(chain, &script.auth_method) {
                if !script.ignore_verify_failure {
                    return Err(e.into());
                }
            }
        }
        if client_mode {
            if let Some((types, issuers)) = &script.certificate_request {
                callbacks.client_certificate_requested(types, issuers)?;
            }
        }

        match &script.result {
            ScriptedResult::Succeed => {}
            ScriptedResult::Fail(msg) => return Err(GatewayError::Engine(msg.clone())),
            ScriptedResult::Timeout => return Err(GatewayError::Timeout),
            ScriptedResult::BlockUntilInterrupted => {
                let mut g = self.inner.lock();
                g.blocked.insert(ssl.0);
                self.cv.notify_all();
                while !g.interrupted.contains(&ssl.0) {
                    self.cv.wait(&mut g);
                }
                g.blocked.remove(&ssl.0);
                return Err(GatewayError::Interrupted);
            }
        }

        match script.completion {
            Completion::BeforeReturn => callbacks.handshake_completed()?,
            Completion::Twice => {
                callbacks.handshake_completed()?;
                callbacks.handshake_completed()?;
            }
            Completion::OnFirstIo => {
                self.with_conn(ssl, |c| c.completion_pending = true)?;
            }
            Completion::Never => {}
        }

        let h = self.fresh();
        let mut g = self.inner.lock();
        let attached = g
            .connections
            .get(&ssl.0)
            .and_then(|c| c.attached_session.clone());
        let resumed = attached
            .filter(|_| script.resume_offered)
            .and_then(|enc| g.issued.get(&enc).cloned());
        let session = resumed.unwrap_or_else(|| script.session.clone());
        g.issued.insert(session.encoded.clone(), session.clone());
        g.sessions.insert(h, session);
        if let Some(conn) = g.connections.get_mut(&ssl.0) {
            conn.inbound = script.inbound.clone();
            conn.negotiated_protocol = script.negotiated_protocol.clone();
        }
        Ok(SessionHandle(h))
    }

    fn read(
        &self,
        ssl: ConnectionHandle,
        _transport: TransportHandle,
        buf: &mut [u8],
        callbacks: &dyn HandshakeCallbacks,
        _timeout: Option<Duration>,
    ) -> Result<usize, GatewayError> {
        self.flush_pending_completion(ssl, callbacks)?;
        self.with_conn(ssl, |c| {
            let n = buf.len().min(c.inbound.len());
            buf[..n].copy_from_slice(&c.inbound[..n]);
            c.inbound.drain(..n);
            n
        })
    }

    fn write(
        &self,
        ssl: ConnectionHandle,
        _transport: TransportHandle,
        data: &[u8],
        callbacks: &dyn HandshakeCallbacks,
    ) -> Result<(), GatewayError> {
        self.flush_pending_completion(ssl, callbacks)?;
        self.with_conn(ssl, |c| c.written.extend_from_slice(data))
    }

    fn renegotiate(&self, ssl: ConnectionHandle) -> Result<(), GatewayError> {
        self.with_conn(ssl, |c| c.renegotiations += 1)
    }

    fn interrupt(&self, ssl: ConnectionHandle) {
        let mut g = self.inner.lock();
        g.interrupt_calls += 1;
        g.interrupted.insert(ssl.0);
        self.cv.notify_all();
    }

    fn shutdown(
        &self,
        ssl: ConnectionHandle,
        _transport: TransportHandle,
        _callbacks: &dyn HandshakeCallbacks,
    ) -> Result<(), GatewayError> {
        self.with_conn(ssl, |c| c.shutdowns += 1)
    }

    fn negotiated_protocol(&self, ssl: ConnectionHandle) -> Option<Vec<u8>> {
        self.with_conn(ssl, |c| c.negotiated_protocol.clone()).ok().flatten()
    }

    fn peer_certificate_chain(&self, _ssl: ConnectionHandle) -> Vec<Vec<u8>> {
        self.inner.lock().script.peer_chain.clone().unwrap_or_default()
    }

    fn local_certificate_chain(&self, ssl: ConnectionHandle) -> Vec<Vec<u8>> {
        self.with_conn(ssl, |c| c.certificate_chain.clone()).unwrap_or_default()
    }

    fn session_id(&self, session: SessionHandle) -> Vec<u8> {
        self.inner.lock().sessions.get(&session.0).map(|s| s.id.clone()).unwrap_or_default()
    }

    fn session_time(&self, session: SessionHandle) -> i64 {
        self.inner.lock().sessions.get(&session.0).map_or(0, |s| s.time_millis)
    }

    fn session_version(&self, session: SessionHandle) -> String {
        self.inner.lock().sessions.get(&session.0).map(|s| s.version.clone()).unwrap_or_default()
    }

    fn session_cipher(&self, session: SessionHandle) -> String {
        self.inner.lock().sessions.get(&session.0).map(|s| s.cipher.clone()).unwrap_or_default()
    }

    fn session_encode(&self, session: SessionHandle) -> Result<Vec<u8>, GatewayError> {
        self.inner
            .lock()
            .sessions
            .get(&session.0)
            .map(|s| s.encoded.clone())
            .ok_or_else(|| unknown("session"))
    }

    fn session_decode(&self, encoded: &[u8]) -> Result<SessionHandle, GatewayError> {
        if encoded.is_empty() {
            return Err(GatewayError::Engine("empty session encoding".into()));
        }
        let h = self.fresh();
        let mut g = self.inner.lock();
        let script = g.issued.get(encoded).cloned().unwrap_or_else(|| SessionScript {
            encoded: encoded.to_vec(),
            ..SessionScript::default()
        });
        g.sessions.insert(h, script);
        Ok(SessionHandle(h))
    }

    fn digest_new(&self, algorithm: &str) -> Result<DigestHandle, GatewayError> {
        let h = self.fresh();
        self.inner.lock().digests.insert(h, (algorithm.to_owned(), Vec::new()));
        Ok(DigestHandle(h))
    }

    fn digest_update(&self, digest: DigestHandle, data: &[u8]) -> Result<(), GatewayError> {
        let mut g = self.inner.lock();
        let (_, buf) = g.digests.get_mut(&digest.0).ok_or_else(|| unknown("digest"))?;
        buf.extend_from_slice(data);
        Ok(())
    }

    /// Returns `"<algorithm>:<input>"`, enough to check wiring.
    fn digest_final(&self, digest: DigestHandle) -> Result<Vec<u8>, GatewayError> {
        let g = self.inner.lock();
        let (alg, buf) = g.digests.get(&digest.0).ok_or_else(|| unknown("digest"))?;
        let mut out = alg.as_bytes().to_vec();
        out.push(b':');
        out.extend_from_slice(buf);
        Ok(out)
    }

    fn digest_free(&self, digest: DigestHandle) {
        let removed = self.inner.lock().digests.remove(&digest.0);
        assert!(removed.is_some(), "double free of digest {}", digest.0);
    }

    fn cipher_new(&self, algorithm: &str, encrypt: bool, key: KeyHandle) -> Result<CipherHandle, GatewayError> {
        let h = self.fresh();
        let mut g = self.inner.lock();
        if !g.keys.contains(&key.0) {
            return Err(unknown("key"));
        }
        g.ciphers.insert(h, (algorithm.to_owned(), encrypt, Vec::new()));
        Ok(CipherHandle(h))
    }

    fn cipher_update(&self, cipher: CipherHandle, input: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let mut g = self.inner.lock();
        let (_, _, buf) = g.ciphers.get_mut(&cipher.0).ok_or_else(|| unknown("cipher"))?;
        buf.extend_from_slice(input);
        Ok(Vec::new())
    }

    /// Returns `"<algorithm><+|->:<input>"`, `+` for encryption.
    fn cipher_final(&self, cipher: CipherHandle) -> Result<Vec<u8>, GatewayError> {
        let g = self.inner.lock();
        let (alg, encrypt, buf) = g.ciphers.get(&cipher.0).ok_or_else(|| unknown("cipher"))?;
        let mut out = alg.as_bytes().to_vec();
        out.push(if *encrypt { b'+' } else { b'-' });
        out.push(b':');
        out.extend_from_slice(buf);
        Ok(out)
    }

    fn cipher_free(&self, cipher: CipherHandle) {
        let removed = self.inner.lock().ciphers.remove(&cipher.0);
        assert!(removed.is_some(), "double free of cipher {}", cipher.0);
    }
}
