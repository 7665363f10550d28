//! Negotiated session records.
//!
//! A record is captured once from the engine after a successful handshake and
//! never changes afterwards, so it is freely shareable between threads.
//!
//! The serialized form wraps the engine's own encoding in a versioned CBOR
//! envelope. The engine part is only meaningful to the same engine version:
//! a record written by one engine build may be refused by another, in which
//! case resumption silently falls back to a full handshake.

use std::fmt::Write as _;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::application::handshake::{HandshakeError, HandshakeOrchestrator};
use crate::core::codec::{CodecError, from_cbor, to_cbor};
use crate::core::handles::SessionGuard;
use crate::domain::{EngineCatalog, ProtocolVersion};
use crate::ports::{EngineGateway, GatewayError, SessionHandle};

const ENVELOPE_VERSION: u8 = 1;
/// Longest session id any TLS version allows.
pub const MAX_SESSION_ID_LEN: usize = 32;
const FINGERPRINT_BYTES: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed session record: {0}")]
    Malformed(String),
    #[error("session codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("engine session error: {0}")]
    Engine(String),
}

impl From<GatewayError> for SessionError {
    fn from(e: GatewayError) -> Self {
        SessionError::Engine(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SessionEnvelope {
    v: u8,
    id: Vec<u8>,
    created_at_millis: u64,
    protocol: ProtocolVersion,
    cipher_suite: String,
    encoded: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    id: Vec<u8>,
    created_at_millis: u64,
    protocol: ProtocolVersion,
    cipher_suite: String,
    encoded: Vec<u8>,
}

impl SessionRecord {
    /// Read everything worth keeping out of an engine session and release
    /// the handle, on success and on every error path.
    ///
    /// The negotiated cipher is mapped back to its standard name; a name the
    /// registry does not know is kept verbatim.
    ///
    /// # Errors
    /// `SessionError::Engine` when the engine reports an unknown protocol, a
    /// negative creation time, an oversized id or cannot encode the session.
    pub fn capture_from_handshake<G: EngineGateway + ?Sized>(
        gateway: &G,
        catalog: &EngineCatalog,
        handle: SessionHandle,
    ) -> Result<Self, SessionError> {
        let guard = SessionGuard::new(gateway, handle);
        let h = guard.handle();

        let id = gateway.session_id(h);
        if id.len() > MAX_SESSION_ID_LEN {
            return Err(SessionError::Engine(format!(
                "session id of {} bytes",
                id.len()
            )));
        }
        let created_at_millis = u64::try_from(gateway.session_time(h))
            .map_err(|_| SessionError::Engine("negative session creation time".into()))?;
        let version = gateway.session_version(h);
        let protocol = ProtocolVersion::from_name(&version).ok_or_else(|| {
            SessionError::Engine(format!("engine negotiated unknown protocol {version}"))
        })?;
        let engine_cipher = gateway.session_cipher(h);
        let cipher_suite = match catalog.cipher_suites().standard_name(&engine_cipher) {
            Some(std) => std.to_owned(),
            None => {
                debug!(cipher = %engine_cipher, "negotiated cipher not in registry");
                engine_cipher
            }
        };
        let encoded = gateway.session_encode(h)?;
        if encoded.is_empty() {
            return Err(SessionError::Engine("engine produced empty session".into()));
        }
        drop(guard);

        Ok(Self {
            id,
            created_at_millis,
            protocol,
            cipher_suite,
            encoded,
        })
    }

    #[must_use]
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    #[must_use]
    pub fn created_at_millis(&self) -> u64 {
        self.created_at_millis
    }

    #[must_use]
    pub fn creation_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.created_at_millis)
    }

    #[must_use]
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Standard name, or the engine name when unregistered.
    #[must_use]
    pub fn cipher_suite(&self) -> &str {
        &self.cipher_suite
    }

    /// Engine-opaque encoding.
    #[must_use]
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// Short hex digest of the id; raw ids never go to logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.id);
        let mut out = String::with_capacity(FINGERPRINT_BYTES * 2);
        for b in &digest[..FINGERPRINT_BYTES] {
            let _ = write!(out, "{b:02x}");
        }
        out
    }

    /// # Errors
    /// `SessionError::Codec` if encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>, SessionError> {
        let env = SessionEnvelope {
            v: ENVELOPE_VERSION,
            id: self.id.clone(),
            created_at_millis: self.created_at_millis,
            protocol: self.protocol,
            cipher_suite: self.cipher_suite.clone(),
            encoded: self.encoded.clone(),
        };
        Ok(to_cbor(&env)?)
    }

    /// Strict inverse of [`Self::serialize`].
    ///
    /// # Errors
    /// `SessionError::Malformed` for anything that is not exactly one
    /// canonical envelope of a known version with a known protocol, an id of
    /// at most 32 bytes, and non-empty cipher and engine encoding.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, SessionError> {
        let env: SessionEnvelope =
            from_cbor(bytes).map_err(|e| SessionError::Malformed(e.to_string()))?;
        if env.v != ENVELOPE_VERSION {
            return Err(SessionError::Malformed(format!(
                "unsupported envelope version {}",
                env.v
            )));
        }
        if env.id.len() > MAX_SESSION_ID_LEN {
            return Err(SessionError::Malformed(format!(
                "session id of {} bytes",
                env.id.len()
            )));
        }
        if env.cipher_suite.is_empty() {
            return Err(SessionError::Malformed("empty cipher suite".into()));
        }
        if env.encoded.is_empty() {
            return Err(SessionError::Malformed("empty engine encoding".into()));
        }
        Ok(Self {
            id: env.id,
            created_at_millis: env.created_at_millis,
            protocol: env.protocol,
            cipher_suite: env.cipher_suite,
            encoded: env.encoded,
        })
    }

    /// Offer this session to a connection that has not started its handshake.
    /// The engine may ignore it and run a full handshake instead.
    ///
    /// # Errors
    /// * `HandshakeError::InvalidState` once the handshake has started.
    /// * `HandshakeError::Engine` if the engine cannot decode or attach it.
    pub fn attach_for_resume<G: EngineGateway + 'static>(
        &self,
        orchestrator: &mut HandshakeOrchestrator<'_, G>,
    ) -> Result<(), HandshakeError> {
        debug!(session = %self.fingerprint(), "attaching session for resumption");
        orchestrator.attach_session(&self.encoded, &self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedGateway, SessionScript};

    fn record() -> SessionRecord {
        SessionRecord {
            id: vec![7; 32],
            created_at_millis: 1_700_000_000_123,
            protocol: ProtocolVersion::Tls1_2,
            cipher_suite: "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA".into(),
            encoded: vec![0x30, 0x82, 0x01],
        }
    }

    #[test]
    fn serialized_form_is_stable() {
        let r = record();
        let first = r.serialize().unwrap();
        let again = SessionRecord::deserialize(&first).unwrap();
        assert_eq!(again, r);
        assert_eq!(again.serialize().unwrap(), first);
    }

    #[test]
    fn corrupt_input_is_malformed() {
        let mut bytes = record().serialize().unwrap();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            SessionRecord::deserialize(&bytes),
            Err(SessionError::Malformed(_))
        ));
        let mut trailing = record().serialize().unwrap();
        trailing.push(0);
        assert!(matches!(
            SessionRecord::deserialize(&trailing),
            Err(SessionError::Malformed(_))
        ));
        assert!(matches!(
            SessionRecord::deserialize(&[]),
            Err(SessionError::Malformed(_))
        ));
    }

    #[test]
    fn envelope_constraints_enforced() {
        let mut env = SessionEnvelope {
            v: 2,
            id: vec![1; 4],
            created_at_millis: 1,
            protocol: ProtocolVersion::Tls1,
            cipher_suite: "SSL_RSA_WITH_RC4_128_MD5".into(),
            encoded: vec![1],
        };
        let wrong_version = to_cbor(&env).unwrap();
        assert!(SessionRecord::deserialize(&wrong_version).is_err());
        env.v = ENVELOPE_VERSION;
        env.encoded.clear();
        assert!(SessionRecord::deserialize(&to_cbor(&env).unwrap()).is_err());
        env.encoded = vec![1];
        env.id = vec![0; 33];
        assert!(SessionRecord::deserialize(&to_cbor(&env).unwrap()).is_err());
    }

    #[test]
    fn capture_maps_cipher_back_and_frees_handle() {
        let gw = ScriptedGateway::new();
        let catalog = EngineCatalog::builtin();
        let h = gw.make_session(&SessionScript {
            cipher: "ECDHE-RSA-AES128-SHA".into(),
            ..SessionScript::default()
        });
        let rec = SessionRecord::capture_from_handshake(&gw, &catalog, h).unwrap();
        assert_eq!(rec.cipher_suite(), "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA");
        assert_eq!(rec.protocol(), ProtocolVersion::Tls1_2);
        assert_eq!(gw.live_sessions(), 0);
    }

    #[test]
    fn capture_keeps_unknown_cipher_verbatim() {
        let gw = ScriptedGateway::new();
        let h = gw.make_session(&SessionScript {
            cipher: "GOST2012-GOST8912-GOST8912".into(),
            ..SessionScript::default()
        });
        let rec = SessionRecord::capture_from_handshake(&gw, &EngineCatalog::builtin(), h).unwrap();
        assert_eq!(rec.cipher_suite(), "GOST2012-GOST8912-GOST8912");
    }

    #[test]
    fn capture_failure_still_frees_handle() {
        let gw = ScriptedGateway::new();
        let h = gw.make_session(&SessionScript {
            version: "TLSv1.3".into(),
            ..SessionScript::default()
        });
        let err = SessionRecord::capture_from_handshake(&gw, &EngineCatalog::builtin(), h)
            .unwrap_err();
        assert!(matches!(err, SessionError::Engine(_)));
        assert_eq!(gw.live_sessions(), 0);
    }

    #[test]
    fn fingerprint_is_short_hex() {
        let fp = record().fingerprint();
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(fp, SessionRecord { id: vec![8; 32], ..record() }.fingerprint());
    }
}
