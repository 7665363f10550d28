//! Infrastructure shared by the application layer: RAII ownership of native
//! handles, engine-backed digest and cipher state and the strict CBOR codec.
pub mod cipher;
pub mod codec;
pub mod digest;
pub mod handles;

pub use cipher::EngineCipher;
pub use codec::{CodecError, from_cbor, to_cbor};
pub use digest::EngineDigest;
pub use handles::{ConnectionGuard, EngineContext, SessionGuard};
