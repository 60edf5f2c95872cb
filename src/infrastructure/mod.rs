//! Infrastructure layer: configuration, catalog loading, and logging.
//!
//! Persistence and the other port implementations live under `adapters`;
//! this layer covers the process-level concerns that run before any
//! repository exists.

pub mod catalog;
pub mod config;
pub mod logging;
