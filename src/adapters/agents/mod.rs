//! Agent executor adapter implementations.

pub mod command;
pub mod mock;

pub use command::CommandAgentExecutor;
pub use mock::{MockAgentExecutor, RecordedCall, ScriptedOutcome};
