//! Service table the engine-backed provider registers.
//!
//! Entries are `"<Type>.<Algorithm>"` keys bound to an implementation id, plus
//! `Alg.Alias.<Type>.<Alias>` entries pointing at a canonical algorithm and a
//! few `"<Type>.<Algorithm> <Attribute>"` keys. Lookups follow a single alias
//! hop; algorithm matching ignores ASCII case, type matching does not.

use std::collections::HashMap;

/// Name the provider registers under.
pub const PROVIDER_NAME: &str = "EngineTls";

const ALIAS_PREFIX: &str = "Alg.Alias.";

const BUILTIN_SERVICES: &[(&str, &str)] = &[
    ("SSLContext.SSL", "engine.ssl_context"),
    ("SSLContext.SSLv3", "engine.ssl_context"),
    ("SSLContext.TLS", "engine.ssl_context"),
    ("SSLContext.TLSv1", "engine.ssl_context"),
    ("SSLContext.TLSv1.1", "engine.ssl_context"),
    ("SSLContext.TLSv1.2", "engine.ssl_context"),
    ("SSLContext.Default", "engine.ssl_context.default"),
    ("MessageDigest.SHA-1", "engine.digest.sha1"),
    ("Alg.Alias.MessageDigest.SHA1", "SHA-1"),
    ("Alg.Alias.MessageDigest.SHA", "SHA-1"),
    ("Alg.Alias.MessageDigest.1.3.14.3.2.26", "SHA-1"),
    ("MessageDigest.SHA-256", "engine.digest.sha256"),
    ("Alg.Alias.MessageDigest.SHA256", "SHA-256"),
    ("Alg.Alias.MessageDigest.2.16.840.1.101.3.4.2.1", "SHA-256"),
    ("MessageDigest.SHA-384", "engine.digest.sha384"),
    ("Alg.Alias.MessageDigest.SHA384", "SHA-384"),
    ("Alg.Alias.MessageDigest.2.16.840.1.101.3.4.2.2", "SHA-384"),
    ("MessageDigest.SHA-512", "engine.digest.sha512"),
    ("Alg.Alias.MessageDigest.SHA512", "SHA-512"),
    ("Alg.Alias.MessageDigest.2.16.840.1.101.3.4.2.3", "SHA-512"),
    ("MessageDigest.MD5", "engine.digest.md5"),
    ("Alg.Alias.MessageDigest.1.2.840.113549.2.5", "MD5"),
    ("KeyPairGenerator.RSA", "engine.keygen.rsa"),
    ("Alg.Alias.KeyPairGenerator.1.2.840.113549.1.1.1", "RSA"),
    ("KeyPairGenerator.DSA", "engine.keygen.dsa"),
    ("KeyFactory.RSA", "engine.keyfactory.rsa"),
    ("Alg.Alias.KeyFactory.1.2.840.113549.1.1.1", "RSA"),
    ("Signature.MD5WithRSA", "engine.signature.md5_rsa"),
    ("Alg.Alias.Signature.MD5WithRSAEncryption", "MD5WithRSA"),
    ("Alg.Alias.Signature.MD5/RSA", "MD5WithRSA"),
    ("Alg.Alias.Signature.1.2.840.113549.1.1.4", "MD5WithRSA"),
    ("Alg.Alias.Signature.1.2.840.113549.2.5with1.2.840.113549.1.1.1", "MD5WithRSA"),
    // No case-variant aliases of canonical names: lookup already folds case.
    ("Signature.SHA1WithRSA", "engine.signature.sha1_rsa"),
    ("Alg.Alias.Signature.SHA1/RSA", "SHA1WithRSA"),
    ("Alg.Alias.Signature.SHA-1/RSA", "SHA1WithRSA"),
    ("Alg.Alias.Signature.1.2.840.113549.1.1.5", "SHA1WithRSA"),
    ("Alg.Alias.Signature.1.3.14.3.2.26with1.2.840.113549.1.1.1", "SHA1WithRSA"),
    ("Alg.Alias.Signature.1.3.14.3.2.26with1.2.840.113549.1.1.5", "SHA1WithRSA"),
    ("Alg.Alias.Signature.1.3.14.3.2.29", "SHA1WithRSA"),
    ("Signature.SHA256WithRSA", "engine.signature.sha256_rsa"),
    ("Alg.Alias.Signature.SHA256WithRSAEncryption", "SHA256WithRSA"),
    ("Alg.Alias.Signature.1.2.840.113549.1.1.11", "SHA256WithRSA"),
    ("Signature.SHA384WithRSA", "engine.signature.sha384_rsa"),
    ("Alg.Alias.Signature.SHA384WithRSAEncryption", "SHA384WithRSA"),
    ("Alg.Alias.Signature.1.2.840.113549.1.1.12", "SHA384WithRSA"),
    ("Signature.SHA512WithRSA", "engine.signature.sha512_rsa"),
    ("Alg.Alias.Signature.SHA512WithRSAEncryption", "SHA512WithRSA"),
    ("Alg.Alias.Signature.1.2.840.113549.1.1.13", "SHA512WithRSA"),
    ("Signature.SHA1withDSA", "engine.signature.sha1_dsa"),
    ("Alg.Alias.Signature.SHA/DSA", "SHA1withDSA"),
    ("Alg.Alias.Signature.DSA", "SHA1withDSA"),
    ("Alg.Alias.Signature.1.3.14.3.2.26with1.2.840.10040.4.1", "SHA1withDSA"),
    ("Alg.Alias.Signature.1.3.14.3.2.26with1.2.840.10040.4.3", "SHA1withDSA"),
    ("Alg.Alias.Signature.DSAWithSHA1", "SHA1withDSA"),
    ("Alg.Alias.Signature.1.2.840.10040.4.3", "SHA1withDSA"),
    ("Signature.NONEwithRSA", "engine.signature.raw_rsa"),
    ("SecureRandom.SHA1PRNG", "engine.random"),
    ("SecureRandom.SHA1PRNG ImplementedIn", "Software"),
    ("Cipher.RSA/ECB/NoPadding", "engine.cipher.rsa_raw"),
    ("Alg.Alias.Cipher.RSA/None/NoPadding", "RSA/ECB/NoPadding"),
    ("Cipher.RSA/ECB/PKCS1Padding", "engine.cipher.rsa_pkcs1"),
    ("Alg.Alias.Cipher.RSA/None/PKCS1Padding", "RSA/ECB/PKCS1Padding"),
];

/// A resolved service entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderService {
    pub service_type: String,
    pub algorithm: String,
    pub implementation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ServiceKey {
    service_type: String,
    algorithm_lower: String,
}

impl ServiceKey {
    fn new(service_type: &str, algorithm: &str) -> Self {
        Self {
            service_type: service_type.to_owned(),
            algorithm_lower: algorithm.to_ascii_lowercase(),
        }
    }
}

/// Frozen provider service table.
#[derive(Debug, Clone, Default)]
pub struct ProviderTable {
    services: Vec<ProviderService>,
    index: HashMap<ServiceKey, usize>,
    aliases: HashMap<ServiceKey, String>,
    attributes: HashMap<(ServiceKey, String), String>,
}

impl ProviderTable {
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (key, value) in BUILTIN_SERVICES {
            table.register(key, value);
        }
        table
    }

    /// Register one raw `key → value` pair. Keys without a type separator are
    /// ignored.
    pub fn register(&mut self, key: &str, value: &str) {
        if let Some(rest) = key.strip_prefix(ALIAS_PREFIX) {
            if let Some((ty, alias)) = rest.split_once('.') {
                self.aliases
                    .insert(ServiceKey::new(ty, alias), value.to_owned());
            }
            return;
        }
        let Some((ty, algorithm)) = key.split_once('.') else {
            return;
        };
        if let Some((algorithm, attribute)) = algorithm.split_once(' ') {
            self.attributes.insert(
                (ServiceKey::new(ty, algorithm), attribute.to_owned()),
                value.to_owned(),
            );
            return;
        }
        let skey = ServiceKey::new(ty, algorithm);
        let service = ProviderService {
            service_type: ty.to_owned(),
            algorithm: algorithm.to_owned(),
            implementation: value.to_owned(),
        };
        match self.index.get(&skey) {
            Some(&idx) => self.services[idx] = service,
            None => {
                self.index.insert(skey, self.services.len());
                self.services.push(service);
            }
        }
    }

    fn canonical(&self, service_type: &str, algorithm: &str) -> Option<usize> {
        let key = ServiceKey::new(service_type, algorithm);
        if let Some(&idx) = self.index.get(&key) {
            return Some(idx);
        }
        let target = self.aliases.get(&key)?;
        self.index
            .get(&ServiceKey::new(service_type, target))
            .copied()
    }

    /// Resolve a type + algorithm (or alias) to its service.
    #[must_use]
    pub fn resolve(&self, service_type: &str, algorithm: &str) -> Option<&ProviderService> {
        self.canonical(service_type, algorithm)
            .map(|idx| &self.services[idx])
    }

    /// Attribute attached to a service, e.g. `ImplementedIn`.
    #[must_use]
    pub fn attribute(&self, service_type: &str, algorithm: &str, name: &str) -> Option<&str> {
        let service = self.resolve(service_type, algorithm)?;
        self.attributes
            .get(&(
                ServiceKey::new(&service.service_type, &service.algorithm),
                name.to_owned(),
            ))
            .map(String::as_str)
    }

    /// Canonical algorithm names for a type in registration order.
    #[must_use]
    pub fn algorithms(&self, service_type: &str) -> Vec<&str> {
        self.services
            .iter()
            .filter(|s| s.service_type == service_type)
            .map(|s| s.algorithm.as_str())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
