pub mod handshake;
pub mod session;
