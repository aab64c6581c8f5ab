//! Repository implementations
//!
//! - `memory` — in-memory storage for tests and single-process embedding
//! - `postgres` — PostgreSQL data access over sqlx

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryChangeHistoryRepository, InMemoryTemplateRepository,
    InMemoryVulnerabilityRepository};
pub use postgres::{SqlxChangeHistoryRepository, SqlxTemplateRepository,
    SqlxVulnerabilityRepository};
