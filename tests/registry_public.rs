//! Naming tables seen from outside the crate.

use tlsgate::core::EngineDigest;
use tlsgate::domain::{
    CipherSuiteRegistry, ProtocolPolicy, ProviderTable, TLS_EMPTY_RENEGOTIATION_INFO_SCSV,
};
use tlsgate::test_support::ScriptedGateway;
use tlsgate::{EngineCatalog, ProtocolVersion, ValidationError};

#[test]
fn default_and_supported_lists_end_with_scsv() {
    let reg = CipherSuiteRegistry::builtin();
    let defaults = reg.default_suites();
    let supported = reg.supported_suites();
    assert_eq!(defaults.last(), Some(&TLS_EMPTY_RENEGOTIATION_INFO_SCSV));
    assert_eq!(supported.last(), Some(&TLS_EMPTY_RENEGOTIATION_INFO_SCSV));
    assert_eq!(supported.len(), reg.len() + 1);
    for name in &defaults {
        assert!(supported.contains(name), "{name} is a default but not supported");
    }
    reg.validate(&defaults).unwrap();
    reg.validate(&supported).unwrap();
}

#[test]
fn standard_and_engine_names_are_a_bijection() {
    let reg = CipherSuiteRegistry::builtin();
    for suite in reg.iter() {
        assert_eq!(reg.engine_name(suite.standard_name()), Some(suite.engine_name()));
        assert_eq!(reg.standard_name(suite.engine_name()), Some(suite.standard_name()));
    }
}

#[test]
fn mixed_naming_translates_in_order() {
    let reg = CipherSuiteRegistry::builtin();
    let engine = reg
        .translate_to_engine(&[
            "AES256-SHA",
            TLS_EMPTY_RENEGOTIATION_INFO_SCSV,
            "TLS_RSA_WITH_AES_128_CBC_SHA",
        ])
        .unwrap();
    assert_eq!(engine, vec!["AES256-SHA", "AES128-SHA"]);

    let err = reg.translate_to_engine(&["AES256-SHA", "", "AES128-SHA"]).unwrap_err();
    assert_eq!(
        err,
        ValidationError::MissingEntry {
            list: "cipher suites",
            index: 1
        }
    );
}

#[test]
fn protocol_policy_round_trips_option_word() {
    let policy = ProtocolPolicy::builtin();
    assert_eq!(policy.default_protocols(), vec!["SSLv3", "TLSv1"]);
    assert_eq!(
        policy.supported_protocols(),
        vec!["SSLv3", "TLSv1", "TLSv1.1", "TLSv1.2"]
    );

    let bits = policy.compute_option_bits(&["TLSv1.2", "TLSv1"]).unwrap();
    let word = bits.apply(policy.all_disable_bits());
    assert_eq!(
        policy.enabled_from_options(word),
        vec![ProtocolVersion::Tls1, ProtocolVersion::Tls1_2]
    );

    assert!(matches!(
        policy.compute_option_bits(&["TLSv1", "SSLv2Hello"]),
        Err(ValidationError::UnsupportedProtocol { index: 1, .. })
    ));
}

#[test]
fn provider_aliases_resolve_case_insensitively() {
    let table = ProviderTable::builtin();
    let by_oid = table.resolve("MessageDigest", "2.16.840.1.101.3.4.2.1").unwrap();
    let by_alias = table.resolve("MessageDigest", "sha256").unwrap();
    assert_eq!(by_oid, by_alias);
    assert_eq!(by_alias.algorithm, "SHA-256");
    assert!(table.resolve("messagedigest", "SHA-256").is_none());
    assert!(table.resolve("MessageDigest", "WHIRLPOOL").is_none());
}

#[test]
fn digest_runs_through_engine_under_canonical_name() {
    let gw = ScriptedGateway::new();
    let catalog = EngineCatalog::global();
    let mut digest = EngineDigest::new(&gw, catalog, "SHA256").unwrap();
    assert_eq!(digest.algorithm(), "SHA-256");
    digest.update(b"ab").unwrap();
    digest.update(b"c").unwrap();
    assert_eq!(digest.finish().unwrap(), b"SHA-256:abc".to_vec());

    assert!(EngineDigest::new(&gw, catalog, "NOT-A-HASH").is_err());
    gw.assert_no_leaks();
}
