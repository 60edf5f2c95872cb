//! CLI command implementations.

pub mod escalation;
pub mod gate;
pub mod init;
pub mod project;
pub mod run;
pub mod task;
