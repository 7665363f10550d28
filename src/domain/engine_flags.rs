//! Engine flag words other than the protocol disable bits.
//!
//! Values mirror the engine's public header and are passed through verbatim.

use std::fmt;
use std::ops::BitOr;

/// Disable stateless session tickets.
pub const OP_NO_TICKET: u64 = 0x0000_4000;
/// Never resume a session while renegotiating.
pub const OP_NO_SESSION_RESUMPTION_ON_RENEGOTIATION: u64 = 0x0001_0000;
/// Mode bit: report handshake completion before the final flight is
/// acknowledged, letting application data flow one round trip earlier.
pub const MODE_HANDSHAKE_CUTTHROUGH: u64 = 0x0000_0040;

/// Peer verification mode word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VerifyMode(u32);

impl VerifyMode {
    pub const NONE: VerifyMode = VerifyMode(0x00);
    pub const PEER: VerifyMode = VerifyMode(0x01);
    pub const FAIL_IF_NO_PEER_CERT: VerifyMode = VerifyMode(0x02);

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn contains(self, other: VerifyMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for VerifyMode {
    type Output = VerifyMode;

    fn bitor(self, rhs: Self) -> Self::Output {
        VerifyMode(self.0 | rhs.0)
    }
}

impl fmt::Debug for VerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("VerifyMode(NONE)");
        }
        let mut parts = Vec::new();
        if self.contains(Self::PEER) {
            parts.push("PEER");
        }
        if self.contains(Self::FAIL_IF_NO_PEER_CERT) {
            parts.push("FAIL_IF_NO_PEER_CERT");
        }
        write!(f, "VerifyMode({})", parts.join(" | "))
    }
}

/// Certificate type codes carried in a server's certificate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCertificateType {
    RsaSign,
    DssSign,
    RsaFixedDh,
    DssFixedDh,
    EcdsaSign,
    RsaFixedEcdh,
    EcdsaFixedEcdh,
}

impl ClientCertificateType {
    /// Map a wire code; unknown codes yield `None` and are skipped by callers.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::RsaSign,
            2 => Self::DssSign,
            3 => Self::RsaFixedDh,
            4 => Self::DssFixedDh,
            64 => Self::EcdsaSign,
            65 => Self::RsaFixedEcdh,
            66 => Self::EcdsaFixedEcdh,
            _ => return None,
        })
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::RsaSign => 1,
            Self::DssSign => 2,
            Self::RsaFixedDh => 3,
            Self::DssFixedDh => 4,
            Self::EcdsaSign => 64,
            Self::RsaFixedEcdh => 65,
            Self::EcdsaFixedEcdh => 66,
        }
    }

    /// Key algorithm name a key manager would look up.
    #[must_use]
    pub fn key_algorithm(self) -> &'static str {
        match self {
            Self::RsaSign => "RSA",
            Self::DssSign => "DSA",
            Self::RsaFixedDh => "DH_RSA",
            Self::DssFixedDh => "DH_DSA",
            Self::EcdsaSign => "EC",
            Self::RsaFixedEcdh => "EC_RSA",
            Self::EcdsaFixedEcdh => "EC_EC",
        }
    }

    /// Decode a request's type list, dropping codes we do not know.
    #[must_use]
    pub fn decode_all(codes: &[u8]) -> Vec<Self> {
        codes.iter().copied().filter_map(Self::from_code).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_mode_combines() {
        let m = VerifyMode::PEER | VerifyMode::FAIL_IF_NO_PEER_CERT;
        assert_eq!(m.bits(), 0x03);
        assert!(m.contains(VerifyMode::PEER));
        assert!(!VerifyMode::NONE.contains(VerifyMode::PEER));
        assert_eq!(format!("{m:?}"), "VerifyMode(PEER | FAIL_IF_NO_PEER_CERT)");
    }

    #[test]
    fn unknown_certificate_types_skipped() {
        let decoded = ClientCertificateType::decode_all(&[1, 7, 64, 200, 66]);
        assert_eq!(
            decoded,
            vec![
                ClientCertificateType::RsaSign,
                ClientCertificateType::EcdsaSign,
                ClientCertificateType::EcdsaFixedEcdh
            ]
        );
        for t in decoded {
            assert_eq!(ClientCertificateType::from_code(t.code()), Some(t));
        }
        assert_eq!(ClientCertificateType::EcdsaSign.key_algorithm(), "EC");
    }
}
