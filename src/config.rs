//! File-driven TLS settings.
//!
//! `.json` files are parsed with `serde_json`, anything else as YAML. Every
//! field is optional; missing ones fall back to the builtin catalog's
//! defaults.
//!
//! ```yaml
//! protocols: [TLSv1, TLSv1.1, TLSv1.2]
//! cipher_suites:
//!   - TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
//!   - TLS_EMPTY_RENEGOTIATION_INFO_SCSV
//! handshake_timeout_ms: 10000
//! verify_mode: require_peer
//! host_name: example.org
//! alpn: [h2, http/1.1]
//! cutthrough: true
//! ```

use core::time::Duration;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::application::handshake::orchestrator::check_host_name;
use crate::application::handshake::{HandshakeError, HandshakeOrchestrator, encode_protocol_list};
use crate::core::handles::EngineContext;
use crate::domain::{EngineCatalog, ValidationError, VerifyMode};
use crate::ports::{EngineGateway, GatewayError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySetting {
    None,
    #[default]
    Peer,
    RequirePeer,
}

impl VerifySetting {
    #[must_use]
    pub fn to_verify_mode(self) -> VerifyMode {
        match self {
            VerifySetting::None => VerifyMode::NONE,
            VerifySetting::Peer => VerifyMode::PEER,
            VerifySetting::RequirePeer => VerifyMode::PEER | VerifyMode::FAIL_IF_NO_PEER_CERT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsSettings {
    pub cipher_suites: Vec<String>,
    pub protocols: Vec<String>,
    /// 0 blocks indefinitely.
    pub handshake_timeout_ms: u64,
    pub verify_mode: VerifySetting,
    pub host_name: Option<String>,
    pub alpn: Vec<String>,
    pub cutthrough: bool,
    pub session_tickets: bool,
    pub session_id_context: Option<String>,
}

impl Default for TlsSettings {
    fn default() -> Self {
        let catalog = EngineCatalog::global();
        Self {
            cipher_suites: catalog
                .cipher_suites()
                .default_suites()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            protocols: catalog
                .protocols()
                .default_protocols()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            handshake_timeout_ms: 0,
            verify_mode: VerifySetting::default(),
            host_name: None,
            alpn: Vec::new(),
            cutthrough: false,
            session_tickets: true,
            session_id_context: None,
        }
    }
}

impl TlsSettings {
    /// # Errors
    /// `ConfigError::Json` on syntax errors or unknown fields.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// # Errors
    /// `ConfigError::Yaml` on syntax errors or unknown fields.
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Read and parse `path`, choosing the format by extension.
    ///
    /// # Errors
    /// `ConfigError::Io` if unreadable, otherwise the parser's error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext.eq_ignore_ascii_case("json") {
            Self::from_json_str(&source)
        } else {
            Self::from_yaml_str(&source)
        }
    }

    /// Run every registry and policy check without touching an engine.
    ///
    /// # Errors
    /// The first `ValidationError` found.
    pub fn validate(&self, catalog: &EngineCatalog) -> Result<(), ConfigError> {
        catalog.cipher_suites().validate(&self.cipher_suites)?;
        catalog.protocols().check_enabled(&self.protocols)?;
        encode_protocol_list(&self.alpn)?;
        if let Some(host) = &self.host_name {
            check_host_name(host)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Configure an orchestrator that has not started yet.
    ///
    /// # Errors
    /// `HandshakeError::Validation` for bad names, `InvalidState` after start.
    pub fn apply_to<G: EngineGateway + 'static>(
        &self,
        orchestrator: &mut HandshakeOrchestrator<'_, G>,
    ) -> Result<(), HandshakeError> {
        orchestrator.set_enabled_cipher_suites(&self.cipher_suites)?;
        orchestrator.set_enabled_protocols(&self.protocols)?;
        orchestrator.set_host_name(self.host_name.as_deref())?;
        orchestrator.set_verify_mode(self.verify_mode.to_verify_mode())?;
        orchestrator.set_cutthrough(self.cutthrough)?;
        orchestrator.set_session_tickets(self.session_tickets)?;
        Ok(())
    }

    /// Context-wide settings.
    ///
    /// # Errors
    /// Propagates the engine's rejection of the id context.
    pub fn apply_to_context<G: EngineGateway + ?Sized>(
        &self,
        context: &EngineContext<G>,
    ) -> Result<(), GatewayError> {
        if let Some(sid) = &self.session_id_context {
            context.set_session_id_context(sid.as_bytes())?;
        }
        Ok(())
    }
}
