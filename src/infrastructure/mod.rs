//! Infrastructure layer for external integrations.
//!
//! Implements the repository interfaces defined by the domain layer.
//!
//! # Modules
//!
//! - [`persistence`] - PostgreSQL repository implementations
//! - [`memory`] - In-process implementations with the same constraints

pub mod memory;
pub mod persistence;
