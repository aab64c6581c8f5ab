//! Vulnerability domain errors

use thiserror::Error;

/// Errors raised by ingestion, mapping, and manual-override operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VulnerabilityError {
    /// The uploaded bytes could not be parsed as delimited tabular text
    #[error("Malformed CSV input: {reason}")]
    MalformedCsv { reason: String },

    /// Required canonical fields could not be resolved from the CSV columns
    #[error("Required fields {missing:?} could not be mapped; available columns: {available:?}")]
    RequiredFieldsMissing {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// Strict-mode validation rejected the batch
    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },

    /// The upload exceeds the configured row limit
    #[error("Upload has {rows} rows, exceeding the limit of {max_rows}")]
    TooManyRows { rows: usize, max_rows: usize },

    /// Month label is not valid `YYYY-MM`
    #[error("Invalid month label: {value} (expected YYYY-MM)")]
    InvalidMonthLabel { value: String },

    /// Severity label outside the canonical set where one was required
    #[error("Invalid severity: {value}. Must be one of: Critical, High, Medium, Low, Info")]
    InvalidSeverity { value: String },

    /// Status label outside the canonical set
    #[error("Invalid status: {value}. Must be one of: new, ongoing, reopened, closed")]
    InvalidStatus { value: String },

    /// Vulnerability record not found
    #[error("Vulnerability record not found: {id}")]
    RecordNotFound { id: String },

    /// Template not found
    #[error("Template not found: {id}")]
    TemplateNotFound { id: String },

    /// Reset requested on a field that was never manually changed
    #[error("Field {field} of record {id} has not been manually changed")]
    NotManuallyChanged { id: String, field: String },

    /// Database operation failed
    #[error("Database error: {message}")]
    DatabaseError { message: String },
}

impl VulnerabilityError {
    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VulnerabilityError::RecordNotFound { .. } | VulnerabilityError::TemplateNotFound { .. }
        )
    }

    /// Check if this error reports invalid caller input rather than an
    /// internal failure
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            VulnerabilityError::MalformedCsv { .. }
                | VulnerabilityError::RequiredFieldsMissing { .. }
                | VulnerabilityError::ValidationFailed { .. }
                | VulnerabilityError::TooManyRows { .. }
                | VulnerabilityError::InvalidMonthLabel { .. }
                | VulnerabilityError::InvalidSeverity { .. }
                | VulnerabilityError::InvalidStatus { .. }
        )
    }
}
