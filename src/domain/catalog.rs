//! Build-once, read-many bundle of every frozen naming table.
//!
//! Components take a `&EngineCatalog` instead of reaching for globals; the
//! process-wide instance from [`EngineCatalog::global`] is only a convenience
//! for callers that have no reason to build their own.

use once_cell::sync::Lazy;

use super::cipher_suite::CipherSuiteRegistry;
use super::protocol::ProtocolPolicy;
use super::provider::ProviderTable;

static GLOBAL: Lazy<EngineCatalog> = Lazy::new(EngineCatalog::builtin);

#[derive(Debug, Clone)]
pub struct EngineCatalog {
    cipher_suites: CipherSuiteRegistry,
    protocols: ProtocolPolicy,
    providers: ProviderTable,
}

impl EngineCatalog {
    #[must_use]
    pub fn new(
        cipher_suites: CipherSuiteRegistry,
        protocols: ProtocolPolicy,
        providers: ProviderTable,
    ) -> Self {
        Self {
            cipher_suites,
            protocols,
            providers,
        }
    }

    /// Tables shipped with the crate.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(
            CipherSuiteRegistry::builtin(),
            ProtocolPolicy::builtin(),
            ProviderTable::builtin(),
        )
    }

    /// Process-wide builtin catalog, initialised on first use.
    #[must_use]
    pub fn global() -> &'static EngineCatalog {
        &GLOBAL
    }

    #[must_use]
    pub fn cipher_suites(&self) -> &CipherSuiteRegistry {
        &self.cipher_suites
    }

    #[must_use]
    pub fn protocols(&self) -> &ProtocolPolicy {
        &self.protocols
    }

    #[must_use]
    pub fn providers(&self) -> &ProviderTable {
        &self.providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_is_shared_and_builtin() {
        let a = EngineCatalog::global();
        let b = EngineCatalog::global();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.cipher_suites().len(), 52);
        assert_eq!(a.protocols().supported_protocols().len(), 4);
        assert!(!a.providers().is_empty());
    }

    #[test]
    fn catalog_is_shareable_across_threads() {
        let catalog = EngineCatalog::global();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(move || {
                    catalog
                        .cipher_suites()
                        .translate_to_engine(&["TLS_RSA_WITH_AES_128_CBC_SHA"])
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec!["AES128-SHA".to_string()]);
        }
    }
}
