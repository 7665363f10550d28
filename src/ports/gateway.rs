//! Native engine gateway contract.
//!
//! The crate never binds to a native engine directly. An adapter outside the
//! crate implements [`EngineGateway`] over whatever FFI surface the engine
//! exposes; everything here only sees opaque handles.
//!
//! Ownership rules:
//! * Every `*_new` / `session_decode` / `do_handshake` success hands the caller
//!   exactly one reference, released with the matching `*_free`.
//! * `set_session` takes its own reference on the engine side; the caller still
//!   frees the handle it passed.
//! * The `core::handles` guards are the only callers of `*_free` in this crate.
//!
//! Thread safety: implementations must be `Send + Sync`. `interrupt` is called
//! from a thread other than the one blocked in `do_handshake`, and may land
//! just before that call starts. An engine must therefore latch the request
//! per connection: the next blocking call on that connection returns
//! `GatewayError::Interrupted` instead of waiting on the transport.

use core::time::Duration;

use crate::domain::VerifyMode;
use crate::ports::callbacks::{CallbackError, HandshakeCallbacks};

macro_rules! opaque_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

opaque_handle!(
    /// Engine context shared by many connections.
    ContextHandle
);
opaque_handle!(
    /// One connection (engine "SSL" object).
    ConnectionHandle
);
opaque_handle!(
    /// Negotiated session.
    SessionHandle
);
opaque_handle!(
    /// Engine-held private key.
    KeyHandle
);
opaque_handle!(
    /// In-progress message digest state.
    DigestHandle
);
opaque_handle!(
    /// In-progress cipher state bound to an engine key.
    CipherHandle
);
opaque_handle!(
    /// Transport (socket) the engine reads and writes; never owned here.
    TransportHandle
);

/// Failures reported across the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The engine reported a failure; the string is its error queue rendered.
    #[error("engine error: {0}")]
    Engine(String),
    /// The blocking call hit its deadline.
    #[error("engine call timed out")]
    Timeout,
    /// The blocking call returned early because `interrupt` was issued.
    #[error("engine call interrupted")]
    Interrupted,
    /// A callback returned an error and the engine aborted the operation.
    #[error("callback aborted engine call: {0}")]
    Callback(#[from] CallbackError),
}

pub trait EngineGateway: Send + Sync {
    // --- lifecycle ---

    /// # Errors
    /// `GatewayError::Engine` when the engine cannot allocate a context.
    fn context_new(&self) -> Result<ContextHandle, GatewayError>;
    fn context_free(&self, ctx: ContextHandle);
    /// # Errors
    /// `GatewayError::Engine` when the engine cannot allocate a connection.
    fn connection_new(&self, ctx: ContextHandle) -> Result<ConnectionHandle, GatewayError>;
    fn connection_free(&self, ssl: ConnectionHandle);
    fn session_free(&self, session: SessionHandle);
    fn key_free(&self, key: KeyHandle);

    // --- configuration ---

    /// # Errors
    /// `GatewayError::Engine` if the context id is rejected (too long).
    fn set_session_id_context(&self, ctx: ContextHandle, sid_ctx: &[u8])
        -> Result<(), GatewayError>;
    fn set_verify_mode(&self, ssl: ConnectionHandle, mode: VerifyMode);
    fn options(&self, ssl: ConnectionHandle) -> u64;
    /// Returns the option word after the update.
    fn set_options(&self, ssl: ConnectionHandle, bits: u64) -> u64;
    /// Returns the option word after the update.
    fn clear_options(&self, ssl: ConnectionHandle, bits: u64) -> u64;
    fn mode(&self, ssl: ConnectionHandle) -> u64;
    fn set_mode(&self, ssl: ConnectionHandle, bits: u64) -> u64;
    fn clear_mode(&self, ssl: ConnectionHandle, bits: u64) -> u64;
    /// Engine-native cipher names in preference order.
    ///
    /// # Errors
    /// `GatewayError::Engine` if none of the names is usable.
    fn set_cipher_list(&self, ssl: ConnectionHandle, engine_names: &[String])
        -> Result<(), GatewayError>;
    /// # Errors
    /// `GatewayError::Engine` if the name is rejected.
    fn set_host_name(&self, ssl: ConnectionHandle, host: &str) -> Result<(), GatewayError>;
    /// # Errors
    /// `GatewayError::Engine` if the session cannot be attached.
    fn set_session(&self, ssl: ConnectionHandle, session: SessionHandle)
        -> Result<(), GatewayError>;
    fn set_session_creation_enabled(&self, ssl: ConnectionHandle, enabled: bool);
    /// DER certificates, leaf first.
    ///
    /// # Errors
    /// `GatewayError::Engine` on unparseable certificates.
    fn use_certificate(&self, ssl: ConnectionHandle, chain: &[Vec<u8>])
        -> Result<(), GatewayError>;
    /// # Errors
    /// `GatewayError::Engine` on an unparseable PKCS#8 key.
    fn use_private_key(&self, ssl: ConnectionHandle, pkcs8: &[u8]) -> Result<(), GatewayError>;
    /// # Errors
    /// `GatewayError::Engine` if the key cannot be attached.
    fn use_private_key_handle(&self, ssl: ConnectionHandle, key: KeyHandle)
        -> Result<(), GatewayError>;
    /// # Errors
    /// `GatewayError::Engine` when certificate and key do not match.
    fn check_private_key(&self, ssl: ConnectionHandle) -> Result<(), GatewayError>;
    /// DER-encoded distinguished names.
    ///
    /// # Errors
    /// `GatewayError::Engine` on unparseable names.
    fn set_client_ca_list(&self, ssl: ConnectionHandle, principals: &[Vec<u8>])
        -> Result<(), GatewayError>;

    // --- execution ---

    /// Runs the handshake to completion on the calling thread.
    ///
    /// `callbacks` may be invoked any number of times before this returns.
    /// `timeout` of `None` blocks indefinitely. `protocols` is the
    /// length-prefixed application protocol list.
    ///
    /// # Errors
    /// * `GatewayError::Timeout` / `GatewayError::Interrupted`.
    /// * `GatewayError::Callback` if a callback aborted.
    /// * `GatewayError::Engine` for any protocol failure.
    fn do_handshake(
        &self,
        ssl: ConnectionHandle,
        transport: TransportHandle,
        callbacks: &dyn HandshakeCallbacks,
        timeout: Option<Duration>,
        client_mode: bool,
        protocols: Option<&[u8]>,
    ) -> Result<SessionHandle, GatewayError>;
    /// # Errors
    /// Same classes as `do_handshake`. `Ok(0)` is end of stream.
    fn read(
        &self,
        ssl: ConnectionHandle,
        transport: TransportHandle,
        buf: &mut [u8],
        callbacks: &dyn HandshakeCallbacks,
        timeout: Option<Duration>,
    ) -> Result<usize, GatewayError>;
    /// # Errors
    /// Same classes as `do_handshake`.
    fn write(
        &self,
        ssl: ConnectionHandle,
        transport: TransportHandle,
        data: &[u8],
        callbacks: &dyn HandshakeCallbacks,
    ) -> Result<(), GatewayError>;
    /// # Errors
    /// `GatewayError::Engine` if renegotiation is refused.
    fn renegotiate(&self, ssl: ConnectionHandle) -> Result<(), GatewayError>;
    /// Wake the blocking call running on `ssl`. With no call in flight the
    /// request is remembered and consumed by the next blocking call.
    fn interrupt(&self, ssl: ConnectionHandle);
    /// # Errors
    /// `GatewayError::Engine` if the close notify cannot be sent.
    fn shutdown(
        &self,
        ssl: ConnectionHandle,
        transport: TransportHandle,
        callbacks: &dyn HandshakeCallbacks,
    ) -> Result<(), GatewayError>;
    fn negotiated_protocol(&self, ssl: ConnectionHandle) -> Option<Vec<u8>>;
    fn peer_certificate_chain(&self, ssl: ConnectionHandle) -> Vec<Vec<u8>>;
    fn local_certificate_chain(&self, ssl: ConnectionHandle) -> Vec<Vec<u8>>;

    // --- session introspection ---

    fn session_id(&self, session: SessionHandle) -> Vec<u8>;
    /// Milliseconds since the Unix epoch.
    fn session_time(&self, session: SessionHandle) -> i64;
    /// Protocol name, e.g. `"TLSv1.2"`.
    fn session_version(&self, session: SessionHandle) -> String;
    /// Engine-native cipher name.
    fn session_cipher(&self, session: SessionHandle) -> String;
    /// # Errors
    /// `GatewayError::Engine` if the session cannot be encoded.
    fn session_encode(&self, session: SessionHandle) -> Result<Vec<u8>, GatewayError>;
    /// # Errors
    /// `GatewayError::Engine` on bytes the engine does not recognise.
    fn session_decode(&self, encoded: &[u8]) -> Result<SessionHandle, GatewayError>;

    // --- digest state ---

    /// `algorithm` is a canonical `MessageDigest` name from the provider table.
    ///
    /// # Errors
    /// `GatewayError::Engine` if the engine lacks the algorithm.
    fn digest_new(&self, algorithm: &str) -> Result<DigestHandle, GatewayError>;
    /// # Errors
    /// `GatewayError::Engine` on an engine failure.
    fn digest_update(&self, digest: DigestHandle, data: &[u8]) -> Result<(), GatewayError>;
    /// # Errors
    /// `GatewayError::Engine` on an engine failure.
    fn digest_final(&self, digest: DigestHandle) -> Result<Vec<u8>, GatewayError>;
    fn digest_free(&self, digest: DigestHandle);

    // --- cipher state ---

    /// `algorithm` is a canonical `Cipher` transformation from the provider
    /// table, e.g. `"RSA/ECB/PKCS1Padding"`.
    ///
    /// # Errors
    /// `GatewayError::Engine` if the engine lacks the transformation or the
    /// key does not fit it.
    fn cipher_new(&self, algorithm: &str, encrypt: bool, key: KeyHandle) -> Result<CipherHandle, GatewayError>;
    /// Buffer input; block ciphers may return nothing until `cipher_final`.
    ///
    /// # Errors
    /// `GatewayError::Engine` on an engine failure.
    fn cipher_update(&self, cipher: CipherHandle, input: &[u8]) -> Result<Vec<u8>, GatewayError>;
    /// # Errors
    /// `GatewayError::Engine` on bad padding or an engine failure.
    fn cipher_final(&self, cipher: CipherHandle) -> Result<Vec<u8>, GatewayError>;
    fn cipher_free(&self, cipher: CipherHandle);
}
