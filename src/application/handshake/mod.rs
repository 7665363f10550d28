pub mod errors;
pub mod fsm_types;
pub mod interrupt;
mod mediator;
pub mod orchestrator;
#[cfg(test)]
mod orchestrator_tests;

pub use errors::*;
pub use fsm_types::*;
pub use interrupt::InterruptHandle;
pub use orchestrator::*;
