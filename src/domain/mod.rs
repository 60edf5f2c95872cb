//! Domain layer for the gatehouse pipeline.
//!
//! This module contains core business models, errors, and the ports the
//! services depend on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DenialReason, DomainError, DomainResult};
