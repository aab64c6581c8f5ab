//! Manual override use cases
//!
//! Authorized callers can set severity or status directly on a record,
//! independent of reconciliation. The first override captures the original
//! value; every override appends one immutable change-history entry. A
//! manually-changed field stays pinned until an explicit reset.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::vulnerability::entities::{ChangeHistoryEntry, VulnerabilityRecord};
use crate::domain::vulnerability::errors::VulnerabilityError;
use crate::domain::vulnerability::repositories::{
    IChangeHistoryRepository, IVulnerabilityRepository,
};
use crate::domain::vulnerability::value_objects::{ChangedField, Severity, VulnStatus};

/// How a manual change addresses its record
#[derive(Debug, Clone)]
pub enum OverrideTarget {
    /// By primary record id
    Id(Uuid),
    /// By identity hash; resolves to the most recent record with that hash
    Hash(String),
}

impl std::fmt::Display for OverrideTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverrideTarget::Id(id) => write!(f, "id:{}", id),
            OverrideTarget::Hash(hash) => write!(f, "hash:{}", hash),
        }
    }
}

/// Outcome of a manual change or reset
#[derive(Debug, Clone)]
pub struct ManualChangeResult {
    pub record: VulnerabilityRecord,
    pub change: ChangeHistoryEntry,
}

async fn resolve_target(
    vulnerabilities: &Arc<dyn IVulnerabilityRepository>,
    target: &OverrideTarget,
) -> Result<VulnerabilityRecord, VulnerabilityError> {
    let record = match target {
        OverrideTarget::Id(id) => vulnerabilities.find_by_id(id).await?,
        OverrideTarget::Hash(hash) => vulnerabilities.find_latest_by_hash(hash).await?,
    };
    record.ok_or_else(|| VulnerabilityError::RecordNotFound {
        id: target.to_string(),
    })
}

/// Use case for manually overriding severity or status
pub struct ManualOverrideUseCase {
    vulnerabilities: Arc<dyn IVulnerabilityRepository>,
    history: Arc<dyn IChangeHistoryRepository>,
}

impl ManualOverrideUseCase {
    pub fn new(
        vulnerabilities: Arc<dyn IVulnerabilityRepository>,
        history: Arc<dyn IChangeHistoryRepository>,
    ) -> Self {
        Self {
            vulnerabilities,
            history,
        }
    }

    /// Apply one manual change and append its history entry.
    ///
    /// `new_value` must be a canonical severity or status label for the
    /// targeted field.
    #[instrument(skip(self), fields(target = %target, field = %field, changed_by = %changed_by))]
    pub async fn execute(
        &self,
        target: OverrideTarget,
        field: ChangedField,
        new_value: &str,
        changed_by: &str,
        reason: Option<String>,
    ) -> Result<ManualChangeResult, VulnerabilityError> {
        let mut record = resolve_target(&self.vulnerabilities, &target).await?;

        let (old_value, new_value) = match field {
            ChangedField::Severity => {
                let severity = Severity::parse(new_value).ok_or_else(|| {
                    VulnerabilityError::InvalidSeverity {
                        value: new_value.to_string(),
                    }
                })?;
                let old = record.override_severity(severity);
                (old.as_str().to_string(), severity.as_str().to_string())
            }
            ChangedField::Status => {
                let status = VulnStatus::parse(new_value).ok_or_else(|| {
                    VulnerabilityError::InvalidStatus {
                        value: new_value.to_string(),
                    }
                })?;
                let old = record.override_status(status);
                (old.as_str().to_string(), status.as_str().to_string())
            }
        };

        self.vulnerabilities.update(&record).await?;

        let change =
            ChangeHistoryEntry::new(&record, field, old_value, new_value, changed_by, reason);
        self.history.append(&change).await?;

        info!(record_id = %record.id, field = %field, "manual override applied");
        Ok(ManualChangeResult { record, change })
    }
}

/// Use case for resetting a manually-overridden field to its original value
pub struct ResetOverrideUseCase {
    vulnerabilities: Arc<dyn IVulnerabilityRepository>,
    history: Arc<dyn IChangeHistoryRepository>,
}

impl ResetOverrideUseCase {
    pub fn new(
        vulnerabilities: Arc<dyn IVulnerabilityRepository>,
        history: Arc<dyn IChangeHistoryRepository>,
    ) -> Self {
        Self {
            vulnerabilities,
            history,
        }
    }

    /// Clear the manually-changed flag and restore the original value.
    ///
    /// The reset itself is recorded in the change history. Fails if the field
    /// was never manually changed.
    #[instrument(skip(self), fields(target = %target, field = %field, changed_by = %changed_by))]
    pub async fn execute(
        &self,
        target: OverrideTarget,
        field: ChangedField,
        changed_by: &str,
        reason: Option<String>,
    ) -> Result<ManualChangeResult, VulnerabilityError> {
        let mut record = resolve_target(&self.vulnerabilities, &target).await?;

        let old_value = record.reset_override(field).ok_or_else(|| {
            VulnerabilityError::NotManuallyChanged {
                id: record.id.to_string(),
                field: field.to_string(),
            }
        })?;
        let new_value = match field {
            ChangedField::Severity => record.severity.as_str().to_string(),
            ChangedField::Status => record.status.as_str().to_string(),
        };

        self.vulnerabilities.update(&record).await?;

        let change =
            ChangeHistoryEntry::new(&record, field, old_value, new_value, changed_by, reason);
        self.history.append(&change).await?;

        info!(record_id = %record.id, field = %field, "manual override reset");
        Ok(ManualChangeResult { record, change })
    }
}

/// Read-side queries over the change history
pub struct ChangeHistoryQuery {
    history: Arc<dyn IChangeHistoryRepository>,
}

impl ChangeHistoryQuery {
    pub fn new(history: Arc<dyn IChangeHistoryRepository>) -> Self {
        Self { history }
    }

    /// History for one record, oldest first
    pub async fn for_record(
        &self,
        record_id: &Uuid,
    ) -> Result<Vec<ChangeHistoryEntry>, VulnerabilityError> {
        self.history.find_by_record(record_id).await
    }

    /// History across all records, most recent first
    pub async fn list_all(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ChangeHistoryEntry>, VulnerabilityError> {
        self.history.list_all(offset, limit).await
    }
}
