//! Domain Layer - Core business logic and entities
//!
//! This module contains the domain entities, value objects, and repository
//! traits for vulnerability ingestion and monthly reconciliation.

pub mod vulnerability;

pub use vulnerability::*;
