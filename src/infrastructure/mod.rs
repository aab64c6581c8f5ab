//! Infrastructure Layer - External integrations
//!
//! CSV reading, column mapping, and repository implementations.

pub mod csv;
pub mod mapping;
pub mod repositories;
