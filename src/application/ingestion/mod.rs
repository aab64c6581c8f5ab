//! Scan upload ingestion and dry-run validation

pub mod normalize;
pub mod reconcile;
pub mod use_cases;

pub use normalize::{NormalizeOutcome, normalize_rows};
pub use reconcile::{assign_status, close_set, dedupe_last_wins};
pub use use_cases::{
    CsvInfo, ImportSummary, TemplateSelector, UploadScanUseCase, ValidateTemplateUseCase,
    ValidationReport,
};
