//! Protocol version policy.
//!
//! The engine enables every protocol it knows unless told otherwise, and it
//! is told otherwise through *disable* bits in its option word. The bit
//! values below are part of the engine's ABI; they are neither contiguous nor
//! ordered by version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

/// Engine option bit disabling SSLv3.
pub const OP_NO_SSLV3: u64 = 0x0200_0000;
/// Engine option bit disabling TLSv1.
pub const OP_NO_TLSV1: u64 = 0x0400_0000;
/// Engine option bit disabling TLSv1.1.
pub const OP_NO_TLSV1_1: u64 = 0x1000_0000;
/// Engine option bit disabling TLSv1.2.
pub const OP_NO_TLSV1_2: u64 = 0x0800_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "SSLv3")]
    Ssl3,
    #[serde(rename = "TLSv1")]
    Tls1,
    #[serde(rename = "TLSv1.1")]
    Tls1_1,
    #[serde(rename = "TLSv1.2")]
    Tls1_2,
}

impl ProtocolVersion {
    /// All versions, oldest first.
    pub const ALL: [ProtocolVersion; 4] = [
        ProtocolVersion::Ssl3,
        ProtocolVersion::Tls1,
        ProtocolVersion::Tls1_1,
        ProtocolVersion::Tls1_2,
    ];

    /// Wire/config name, e.g. `"TLSv1.1"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ProtocolVersion::Ssl3 => "SSLv3",
            ProtocolVersion::Tls1 => "TLSv1",
            ProtocolVersion::Tls1_1 => "TLSv1.1",
            ProtocolVersion::Tls1_2 => "TLSv1.2",
        }
    }

    /// The option bit that disables this version in the engine.
    #[must_use]
    pub fn disable_bit(self) -> u64 {
        match self {
            ProtocolVersion::Ssl3 => OP_NO_SSLV3,
            ProtocolVersion::Tls1 => OP_NO_TLSV1,
            ProtocolVersion::Tls1_1 => OP_NO_TLSV1_1,
            ProtocolVersion::Tls1_2 => OP_NO_TLSV1_2,
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProtocolVersion {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ValidationError::UnsupportedProtocol {
            name: s.to_owned(),
            index: 0,
        })
    }
}

/// Pair of masks to apply to the engine option word: `to_set` first, then
/// `to_clear`. Both act on the same word, so the order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionBits {
    pub to_set: u64,
    pub to_clear: u64,
}

impl OptionBits {
    /// Result of applying the pair to `word` in the engine's order.
    #[must_use]
    pub fn apply(self, word: u64) -> u64 {
        (word | self.to_set) & !self.to_clear
    }
}

/// Frozen default/supported protocol lists.
///
/// The default list is intentionally narrower than the supported one:
/// newer versions are offered only when a caller enables them.
#[derive(Debug, Clone)]
pub struct ProtocolPolicy {
    supported: Vec<ProtocolVersion>,
    defaults: Vec<ProtocolVersion>,
}

impl ProtocolPolicy {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            supported: ProtocolVersion::ALL.to_vec(),
            defaults: vec![ProtocolVersion::Ssl3, ProtocolVersion::Tls1],
        }
    }

    #[must_use]
    pub fn default_versions(&self) -> &[ProtocolVersion] {
        &self.defaults
    }

    #[must_use]
    pub fn supported_versions(&self) -> &[ProtocolVersion] {
        &self.supported
    }

    #[must_use]
    pub fn default_protocols(&self) -> Vec<&'static str> {
        self.defaults.iter().map(|v| v.name()).collect()
    }

    #[must_use]
    pub fn supported_protocols(&self) -> Vec<&'static str> {
        self.supported.iter().map(|v| v.name()).collect()
    }

    /// Every disable bit this policy manages.
    #[must_use]
    pub fn all_disable_bits(&self) -> u64 {
        self.supported
            .iter()
            .fold(0, |acc, v| acc | v.disable_bit())
    }

    /// Parse and check a requested enabled set. An empty list is valid and
    /// means every protocol ends up disabled.
    ///
    /// # Errors
    /// * [`ValidationError::MissingEntry`] for an empty name.
    /// * [`ValidationError::UnsupportedProtocol`] for unknown names
    ///   (e.g. `"SSLv2"`).
    pub fn check_enabled<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<ProtocolVersion>, ValidationError> {
        let mut versions = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let name = name.as_ref();
            if name.is_empty() {
                return Err(ValidationError::MissingEntry {
                    list: "protocols",
                    index,
                });
            }
            let version = ProtocolVersion::from_name(name)
                .filter(|v| self.supported.contains(v))
                .ok_or_else(|| ValidationError::UnsupportedProtocol {
                    name: name.to_owned(),
                    index,
                })?;
            versions.push(version);
        }
        Ok(versions)
    }

    /// Negative-logic translation of an enabled set.
    ///
    /// Starts from "everything disabled" and moves each requested version's
    /// bit from `to_set` into `to_clear`.
    ///
    /// # Errors
    /// Same as [`Self::check_enabled`]; runs before any bit is computed.
    pub fn compute_option_bits<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<OptionBits, ValidationError> {
        let versions = self.check_enabled(names)?;
        Ok(self.option_bits_for(&versions))
    }

    /// Same as [`Self::compute_option_bits`] for already-parsed versions.
    #[must_use]
    pub fn option_bits_for(&self, versions: &[ProtocolVersion]) -> OptionBits {
        let mut bits = OptionBits {
            to_set: self.all_disable_bits(),
            to_clear: 0,
        };
        for v in versions {
            bits.to_set &= !v.disable_bit();
            bits.to_clear |= v.disable_bit();
        }
        bits
    }

    /// Versions an engine option word leaves enabled.
    #[must_use]
    pub fn enabled_from_options(&self, word: u64) -> Vec<ProtocolVersion> {
        self.supported
            .iter()
            .copied()
            .filter(|v| word & v.disable_bit() == 0)
            .collect()
    }
}
