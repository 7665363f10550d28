//! Cipher suite naming.
//!
//! Callers speak standard suite names (`TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA`);
//! the engine speaks its own short names (`ECDHE-RSA-AES128-SHA`). The
//! registry is the frozen bijection between the two, in priority order.
//!
//! Invariants:
//! * Every standard name maps to exactly one engine name and back.
//! * Priority is insertion order and drives both the supported list and the
//!   order in which defaults are offered.
//! * [`TLS_EMPTY_RENEGOTIATION_INFO_SCSV`] is listed everywhere but never
//!   reaches the engine.

use std::collections::HashMap;

use tracing::warn;

use super::errors::ValidationError;

/// RFC 5746 renegotiation indication signalling value. Not a real suite: it
/// only advertises secure renegotiation support, which the engine always
/// provides on its own.
pub const TLS_EMPTY_RENEGOTIATION_INFO_SCSV: &str = "TLS_EMPTY_RENEGOTIATION_INFO_SCSV";

/// Standard ↔ engine names, in priority order.
pub const BUILTIN_CIPHER_SUITES: &[(&str, &str)] = &[
    ("SSL_RSA_WITH_RC4_128_MD5", "RC4-MD5"),
    ("SSL_RSA_WITH_RC4_128_SHA", "RC4-SHA"),
    ("TLS_RSA_WITH_AES_128_CBC_SHA", "AES128-SHA"),
    ("TLS_RSA_WITH_AES_256_CBC_SHA", "AES256-SHA"),
    ("TLS_ECDH_ECDSA_WITH_RC4_128_SHA", "ECDH-ECDSA-RC4-SHA"),
    ("TLS_ECDH_ECDSA_WITH_AES_128_CBC_SHA", "ECDH-ECDSA-AES128-SHA"),
    ("TLS_ECDH_ECDSA_WITH_AES_256_CBC_SHA", "ECDH-ECDSA-AES256-SHA"),
    ("TLS_ECDH_RSA_WITH_RC4_128_SHA", "ECDH-RSA-RC4-SHA"),
    ("TLS_ECDH_RSA_WITH_AES_128_CBC_SHA", "ECDH-RSA-AES128-SHA"),
    ("TLS_ECDH_RSA_WITH_AES_256_CBC_SHA", "ECDH-RSA-AES256-SHA"),
    ("TLS_ECDHE_ECDSA_WITH_RC4_128_SHA", "ECDHE-ECDSA-RC4-SHA"),
    ("TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", "ECDHE-ECDSA-AES128-SHA"),
    ("TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA", "ECDHE-ECDSA-AES256-SHA"),
    ("TLS_ECDHE_RSA_WITH_RC4_128_SHA", "ECDHE-RSA-RC4-SHA"),
    ("TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", "ECDHE-RSA-AES128-SHA"),
    ("TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA", "ECDHE-RSA-AES256-SHA"),
    ("TLS_DHE_RSA_WITH_AES_128_CBC_SHA", "DHE-RSA-AES128-SHA"),
    ("TLS_DHE_RSA_WITH_AES_256_CBC_SHA", "DHE-RSA-AES256-SHA"),
    ("TLS_DHE_DSS_WITH_AES_128_CBC_SHA", "DHE-DSS-AES128-SHA"),
    ("TLS_DHE_DSS_WITH_AES_256_CBC_SHA", "DHE-DSS-AES256-SHA"),
    ("SSL_RSA_WITH_3DES_EDE_CBC_SHA", "DES-CBC3-SHA"),
    ("TLS_ECDH_ECDSA_WITH_3DES_EDE_CBC_SHA", "ECDH-ECDSA-DES-CBC3-SHA"),
    ("TLS_ECDH_RSA_WITH_3DES_EDE_CBC_SHA", "ECDH-RSA-DES-CBC3-SHA"),
    ("TLS_ECDHE_ECDSA_WITH_3DES_EDE_CBC_SHA", "ECDHE-ECDSA-DES-CBC3-SHA"),
    ("TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA", "ECDHE-RSA-DES-CBC3-SHA"),
    ("SSL_DHE_RSA_WITH_3DES_EDE_CBC_SHA", "EDH-RSA-DES-CBC3-SHA"),
    ("SSL_DHE_DSS_WITH_3DES_EDE_CBC_SHA", "EDH-DSS-DES-CBC3-SHA"),
    ("SSL_RSA_WITH_DES_CBC_SHA", "DES-CBC-SHA"),
    ("SSL_DHE_RSA_WITH_DES_CBC_SHA", "EDH-RSA-DES-CBC-SHA"),
    ("SSL_DHE_DSS_WITH_DES_CBC_SHA", "EDH-DSS-DES-CBC-SHA"),
    ("SSL_RSA_EXPORT_WITH_RC4_40_MD5", "EXP-RC4-MD5"),
    ("SSL_RSA_EXPORT_WITH_DES40_CBC_SHA", "EXP-DES-CBC-SHA"),
    ("SSL_DHE_RSA_EXPORT_WITH_DES40_CBC_SHA", "EXP-EDH-RSA-DES-CBC-SHA"),
    ("SSL_DHE_DSS_EXPORT_WITH_DES40_CBC_SHA", "EXP-EDH-DSS-DES-CBC-SHA"),
    ("SSL_RSA_WITH_NULL_MD5", "NULL-MD5"),
    ("SSL_RSA_WITH_NULL_SHA", "NULL-SHA"),
    ("TLS_ECDH_ECDSA_WITH_NULL_SHA", "ECDH-ECDSA-NULL-SHA"),
    ("TLS_ECDH_RSA_WITH_NULL_SHA", "ECDH-RSA-NULL-SHA"),
    ("TLS_ECDHE_ECDSA_WITH_NULL_SHA", "ECDHE-ECDSA-NULL-SHA"),
    ("TLS_ECDHE_RSA_WITH_NULL_SHA", "ECDHE-RSA-NULL-SHA"),
    ("SSL_DH_anon_WITH_RC4_128_MD5", "ADH-RC4-MD5"),
    ("TLS_DH_anon_WITH_AES_128_CBC_SHA", "ADH-AES128-SHA"),
    ("TLS_DH_anon_WITH_AES_256_CBC_SHA", "ADH-AES256-SHA"),
    ("SSL_DH_anon_WITH_3DES_EDE_CBC_SHA", "ADH-DES-CBC3-SHA"),
    ("SSL_DH_anon_WITH_DES_CBC_SHA", "ADH-DES-CBC-SHA"),
    ("TLS_ECDH_anon_WITH_RC4_128_SHA", "AECDH-RC4-SHA"),
    ("TLS_ECDH_anon_WITH_AES_128_CBC_SHA", "AECDH-AES128-SHA"),
    ("TLS_ECDH_anon_WITH_AES_256_CBC_SHA", "AECDH-AES256-SHA"),
    ("TLS_ECDH_anon_WITH_3DES_EDE_CBC_SHA", "AECDH-DES-CBC3-SHA"),
    ("SSL_DH_anon_EXPORT_WITH_RC4_40_MD5", "EXP-ADH-RC4-MD5"),
    ("SSL_DH_anon_EXPORT_WITH_DES40_CBC_SHA", "EXP-ADH-DES-CBC-SHA"),
    ("TLS_ECDH_anon_WITH_NULL_SHA", "AECDH-NULL-SHA"),
];

/// Suites enabled without an explicit opt-in. Newer and weaker entries of
/// the table (NULL, anonymous) stay supported-only.
pub const BUILTIN_DEFAULT_SUITES: &[&str] = &[
    "SSL_RSA_WITH_RC4_128_MD5",
    "SSL_RSA_WITH_RC4_128_SHA",
    "TLS_RSA_WITH_AES_128_CBC_SHA",
    "TLS_RSA_WITH_AES_256_CBC_SHA",
    "TLS_ECDH_ECDSA_WITH_RC4_128_SHA",
    "TLS_ECDH_ECDSA_WITH_AES_128_CBC_SHA",
    "TLS_ECDH_ECDSA_WITH_AES_256_CBC_SHA",
    "TLS_ECDH_RSA_WITH_RC4_128_SHA",
    "TLS_ECDH_RSA_WITH_AES_128_CBC_SHA",
    "TLS_ECDH_RSA_WITH_AES_256_CBC_SHA",
    "TLS_ECDHE_ECDSA_WITH_RC4_128_SHA",
    "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
    "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_RC4_128_SHA",
    "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
    "TLS_DHE_RSA_WITH_AES_128_CBC_SHA",
    "TLS_DHE_RSA_WITH_AES_256_CBC_SHA",
    "TLS_DHE_DSS_WITH_AES_128_CBC_SHA",
    "TLS_DHE_DSS_WITH_AES_256_CBC_SHA",
    "SSL_RSA_WITH_3DES_EDE_CBC_SHA",
    "TLS_ECDH_ECDSA_WITH_3DES_EDE_CBC_SHA",
    "TLS_ECDH_RSA_WITH_3DES_EDE_CBC_SHA",
    "TLS_ECDHE_ECDSA_WITH_3DES_EDE_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA",
    "SSL_DHE_RSA_WITH_3DES_EDE_CBC_SHA",
    "SSL_DHE_DSS_WITH_3DES_EDE_CBC_SHA",
    "SSL_RSA_WITH_DES_CBC_SHA",
    "SSL_DHE_RSA_WITH_DES_CBC_SHA",
    "SSL_DHE_DSS_WITH_DES_CBC_SHA",
    "SSL_RSA_EXPORT_WITH_RC4_40_MD5",
    "SSL_RSA_EXPORT_WITH_DES40_CBC_SHA",
    "SSL_DHE_RSA_EXPORT_WITH_DES40_CBC_SHA",
    "SSL_DHE_DSS_EXPORT_WITH_DES40_CBC_SHA",
];

/// One registered suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherSuite {
    standard_name: String,
    engine_name: String,
    priority: usize,
}

impl CipherSuite {
    /// Application-facing name.
    #[must_use]
    pub fn standard_name(&self) -> &str {
        &self.standard_name
    }

    /// Engine-native name.
    #[must_use]
    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    /// Zero-based position in the registry; lower is preferred.
    #[must_use]
    pub fn priority(&self) -> usize {
        self.priority
    }
}

/// How a caller-supplied name was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameKind {
    Standard(usize),
    Engine(usize),
    Scsv,
}

/// Frozen standard ↔ engine cipher suite table.
#[derive(Debug, Clone)]
pub struct CipherSuiteRegistry {
    suites: Vec<CipherSuite>,
    by_standard: HashMap<String, usize>,
    by_engine: HashMap<String, usize>,
    defaults: Vec<usize>,
}

impl CipherSuiteRegistry {
    /// The table shipped with the crate, with its conservative default list.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (standard, engine) in BUILTIN_CIPHER_SUITES {
            registry.push(standard, engine);
        }
        registry.defaults = BUILTIN_DEFAULT_SUITES
            .iter()
            .filter_map(|name| registry.by_standard.get(*name).copied())
            .collect();
        debug_assert_eq!(registry.suites.len(), BUILTIN_CIPHER_SUITES.len());
        debug_assert_eq!(registry.defaults.len(), BUILTIN_DEFAULT_SUITES.len());
        registry
    }

    /// Build a registry from `(standard, engine)` pairs in priority order.
    /// Every entry is enabled by default until [`Self::with_defaults`]
    /// narrows the list.
    ///
    /// # Errors
    /// [`ValidationError::DuplicateSuite`] if either column repeats a name,
    /// or [`ValidationError::MissingEntry`] for an empty name.
    pub fn from_entries<I, S, E>(entries: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (S, E)>,
        S: AsRef<str>,
        E: AsRef<str>,
    {
        let mut registry = Self::empty();
        for (index, (standard, engine)) in entries.into_iter().enumerate() {
            let (standard, engine) = (standard.as_ref(), engine.as_ref());
            if standard.is_empty() || engine.is_empty() {
                return Err(ValidationError::MissingEntry {
                    list: "cipher suite table",
                    index,
                });
            }
            if registry.by_standard.contains_key(standard) {
                return Err(ValidationError::DuplicateSuite {
                    column: "standard",
                    name: standard.to_owned(),
                });
            }
            if registry.by_engine.contains_key(engine) {
                return Err(ValidationError::DuplicateSuite {
                    column: "engine",
                    name: engine.to_owned(),
                });
            }
            registry.push(standard, engine);
        }
        registry.defaults = (0..registry.suites.len()).collect();
        Ok(registry)
    }

    /// Narrow the default list to `names` (standard names, kept in the order
    /// given).
    ///
    /// # Errors
    /// [`ValidationError::UnknownDefault`] if a name is not registered.
    pub fn with_defaults<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, ValidationError> {
        let mut defaults = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let idx = self
                .by_standard
                .get(name)
                .copied()
                .ok_or_else(|| ValidationError::UnknownDefault {
                    name: name.to_owned(),
                })?;
            defaults.push(idx);
        }
        self.defaults = defaults;
        Ok(self)
    }

    fn empty() -> Self {
        Self {
            suites: Vec::new(),
            by_standard: HashMap::new(),
            by_engine: HashMap::new(),
            defaults: Vec::new(),
        }
    }

    fn push(&mut self, standard: &str, engine: &str) {
        let priority = self.suites.len();
        self.by_standard.insert(standard.to_owned(), priority);
        self.by_engine.insert(engine.to_owned(), priority);
        self.suites.push(CipherSuite {
            standard_name: standard.to_owned(),
            engine_name: engine.to_owned(),
            priority,
        });
    }

    /// Default suites followed by the SCSV.
    #[must_use]
    pub fn default_suites(&self) -> Vec<&str> {
        self.defaults
            .iter()
            .map(|&idx| self.suites[idx].standard_name())
            .chain(std::iter::once(TLS_EMPTY_RENEGOTIATION_INFO_SCSV))
            .collect()
    }

    /// Every registered standard name in priority order, followed by the
    /// SCSV. Always `len() + 1` entries.
    #[must_use]
    pub fn supported_suites(&self) -> Vec<&str> {
        self.suites
            .iter()
            .map(CipherSuite::standard_name)
            .chain(std::iter::once(TLS_EMPTY_RENEGOTIATION_INFO_SCSV))
            .collect()
    }

    fn classify(&self, name: &str) -> Option<NameKind> {
        if name == TLS_EMPTY_RENEGOTIATION_INFO_SCSV {
            return Some(NameKind::Scsv);
        }
        if let Some(&idx) = self.by_standard.get(name) {
            return Some(NameKind::Standard(idx));
        }
        self.by_engine.get(name).map(|&idx| NameKind::Engine(idx))
    }

    /// Check a caller-supplied list without applying any of it.
    ///
    /// Engine names are accepted for backward compatibility and logged.
    ///
    /// # Errors
    /// The first offending entry, with its index:
    /// * [`ValidationError::MissingEntry`] for an empty name.
    /// * [`ValidationError::UnsupportedCipherSuite`] for anything unknown.
    pub fn validate<S: AsRef<str>>(&self, names: &[S]) -> Result<(), ValidationError> {
        self.classify_all(names).map(|_| ())
    }

    fn classify_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<NameKind>, ValidationError> {
        let mut kinds = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let name = name.as_ref();
            if name.is_empty() {
                return Err(ValidationError::MissingEntry {
                    list: "cipher suites",
                    index,
                });
            }
            let kind = self
                .classify(name)
                .ok_or_else(|| ValidationError::UnsupportedCipherSuite {
                    name: name.to_owned(),
                    index,
                })?;
            if matches!(kind, NameKind::Engine(_)) {
                warn!(suite = name, index, "engine-native cipher suite name used");
            }
            kinds.push(kind);
        }
        Ok(kinds)
    }

    /// Validate, drop the SCSV and emit engine names in input order.
    ///
    /// # Errors
    /// Same as [`Self::validate`]; nothing is translated on failure.
    pub fn translate_to_engine<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<String>, ValidationError> {
        let kinds = self.classify_all(names)?;
        Ok(kinds
            .into_iter()
            .filter_map(|kind| match kind {
                NameKind::Standard(idx) | NameKind::Engine(idx) => {
                    Some(self.suites[idx].engine_name.clone())
                }
                NameKind::Scsv => None,
            })
            .collect())
    }

    /// Engine name for a standard name.
    #[must_use]
    pub fn engine_name(&self, standard: &str) -> Option<&str> {
        self.by_standard
            .get(standard)
            .map(|&idx| self.suites[idx].engine_name())
    }

    /// Standard name for an engine name.
    #[must_use]
    pub fn standard_name(&self, engine: &str) -> Option<&str> {
        self.by_engine
            .get(engine)
            .map(|&idx| self.suites[idx].standard_name())
    }

    /// Lookup by standard name.
    #[must_use]
    pub fn get(&self, standard: &str) -> Option<&CipherSuite> {
        self.by_standard.get(standard).map(|&idx| &self.suites[idx])
    }

    /// Registered suites in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &CipherSuite> {
        self.suites.iter()
    }

    /// Number of registered suites (the SCSV is not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.suites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}
