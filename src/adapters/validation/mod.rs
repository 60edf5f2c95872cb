//! Validation adapter implementations.

pub mod command;
pub mod mock;

pub use command::CommandValidator;
pub use mock::MockValidator;
