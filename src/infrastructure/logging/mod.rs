//! Logging infrastructure.
//!
//! Structured logging using tracing and tracing-subscriber: a pretty or
//! JSON stdout layer, plus an optional JSON file layer with daily rotation
//! when a log directory is configured.

pub mod logger;

pub use logger::Logger;
