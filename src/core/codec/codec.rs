//! Strict deterministic CBOR helpers.
//!
//! * `to_cbor` serializes any `T: Serialize` with **ciborium**, which emits
//!   the deterministic encoding for the structs used here.
//! * `from_cbor` is always strict: one item, no trailing bytes, and the input
//!   must be byte-identical to the re-encoded value.
//!
//! Callers pass exactly the CBOR payload. Any framing is stripped first.

use std::io::Cursor;

use serde::{Serialize, de::DeserializeOwned};

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("CBOR encode error: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("CBOR decode error: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("{0} trailing bytes after CBOR value")]
    TrailingBytes(usize),

    /// Well-formed CBOR that is not the unique deterministic encoding.
    #[error("CBOR input is not in canonical form")]
    NonCanonical,
}

/// # Errors
/// [`CodecError::Encode`] if serialization fails.
pub fn to_cbor<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(128);
    ciborium::ser::into_writer(v, &mut buf)?;
    Ok(buf)
}

/// # Errors
/// * [`CodecError::Decode`] for malformed input or a type mismatch.
/// * [`CodecError::TrailingBytes`] when more than one item is present.
/// * [`CodecError::NonCanonical`] when the bytes are not the canonical form.
pub fn from_cbor<T: DeserializeOwned + Serialize>(b: &[u8]) -> Result<T, CodecError> {
    let mut cur = Cursor::new(b);
    let value: T = ciborium::de::from_reader(&mut cur)?;
    let consumed = usize::try_from(cur.position()).unwrap_or(usize::MAX);
    if consumed < b.len() {
        return Err(CodecError::TrailingBytes(b.len() - consumed));
    }
    if to_cbor(&value)? != b {
        return Err(CodecError::NonCanonical);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Pair {
        a: u32,
        b: String,
    }

    #[test]
    fn trailing_item_rejected() {
        let mut bytes = to_cbor(&Pair { a: 1, b: "x".into() }).unwrap();
        bytes.push(0x00);
        assert!(matches!(
            from_cbor::<Pair>(&bytes),
            Err(CodecError::TrailingBytes(1))
        ));
    }

    #[test]
    fn non_minimal_integer_rejected() {
        // map(2) { "a": uint8(1) (non-minimal), "b": "x" }
        let bytes = [
            0xA2, 0x61, b'a', 0x18, 0x01, 0x61, b'b', 0x61, b'x',
        ];
        assert!(matches!(
            from_cbor::<Pair>(&bytes),
            Err(CodecError::NonCanonical)
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            from_cbor::<Pair>(&[0xFF, 0x00]),
            Err(CodecError::Decode(_))
        ));
    }
}
