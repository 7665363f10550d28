pub mod callbacks;
pub mod gateway;

pub use callbacks::*;
pub use gateway::*;
