//! Hakon Core - Vulnerability scan ingestion and reconciliation
//!
//! This crate implements the ingestion core of the Hakon vulnerability
//! management backend: scanner CSV exports are normalized through
//! column-mapping templates, deduplicated by a content-derived identity hash,
//! and tracked across monthly snapshots with lifecycle statuses
//! (new, ongoing, reopened, closed).
//!
//! # Modules
//!
//! - [`config`] — Strongly-typed configuration with file and environment variable support
//! - [`domain`] — Core domain entities, value objects, and repository traits
//! - [`application`] — Ingestion, template, and manual-override use cases
//! - [`infrastructure`] — CSV reading, column mapping, and repository implementations
//! - [`logging`] — Structured logging with tracing
//!
//! # Architecture
//!
//! The crate follows Domain-Driven Design principles:
//!
//! ```text
//! hakon-core/
//! ├── domain/           # Pure business logic
//! │   └── vulnerability/# Records, templates, change history, hashes
//! ├── application/      # Use cases
//! │   ├── ingestion/    # Upload + dry-run validation
//! │   ├── templates/    # Template CRUD and auto-creation
//! │   └── overrides/    # Manual severity/status changes
//! ├── infrastructure/   # External integrations
//! │   ├── csv/          # Delimited-text reading
//! │   ├── mapping/      # Column auto-detection and severity normalization
//! │   └── repositories/ # PostgreSQL and in-memory data access
//! └── config/           # Configuration management
//! ```
//!
//! # Ingestion flow
//!
//! CSV bytes → column mapper (canonical rows) → reconciliation engine
//! (identity hash + status assignment) → repository commit. The close pass for
//! findings absent from the new month and the row inserts are committed as one
//! transaction.
//!
//! # Configuration
//!
//! Environment variables use the `HAKON__` prefix with double underscore
//! separators:
//!
//! ```bash
//! HAKON__DATABASE__MAX_CONNECTIONS=10
//! HAKON__INGESTION__STRICT=true
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
