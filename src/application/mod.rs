//! Application Layer - Use cases
//!
//! Ingestion (upload + dry-run validation), template management, and manual
//! overrides. Use cases hold `Arc<dyn ...Repository>` seams and contain the
//! orchestration logic; pure domain rules live in `domain`.

pub mod ingestion;
pub mod overrides;
pub mod templates;
