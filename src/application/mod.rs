//! Application layer: drivers that compose the domain services into runs.

pub mod pipeline_runner;

pub use pipeline_runner::{PipelineRunner, RunHalt, RunSummary};
