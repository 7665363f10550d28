#[allow(clippy::module_inception)]
mod codec;

pub use codec::*;
