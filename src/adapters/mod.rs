//! Infrastructure adapters for external systems.

pub mod agents;
pub mod sqlite;
pub mod validation;
pub mod workspace;
