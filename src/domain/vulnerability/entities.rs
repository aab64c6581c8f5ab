//! Vulnerability domain entities

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{
    ChangedField, MonthLabel, NormalizedRow, Severity, VulnStatus, compute_vuln_hash,
};

/// One finding in one monthly snapshot
///
/// Records are append-only per snapshot: ingestion creates them, and after that
/// only manual overrides and the close pass mutate severity or status. The
/// original severity/status pair is captured once, on the first manual change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    /// Unique record identifier
    pub id: Uuid,
    /// Content-derived identity hash (64-char lowercase hex)
    pub vuln_hash: String,
    pub ip: String,
    pub hostname: String,
    pub nvt_name: String,
    pub severity: Severity,
    pub cvss: Option<f64>,
    /// Associated CVE identifiers, order-normalized
    pub cves: Vec<String>,
    /// Monthly snapshot this record belongs to
    pub month: MonthLabel,
    pub status: VulnStatus,
    /// Severity as originally ingested; diverges from `severity` only after a
    /// manual override
    pub original_severity: Severity,
    pub severity_manually_changed: bool,
    /// Status as originally assigned by reconciliation
    pub original_status: VulnStatus,
    pub status_manually_changed: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VulnerabilityRecord {
    /// Create a record from a normalized row for the given snapshot month
    pub fn from_row(
        row: NormalizedRow,
        month: MonthLabel,
        status: VulnStatus,
        created_by: &str,
    ) -> Self {
        let now = Utc::now();
        let vuln_hash = row.vuln_hash();
        Self {
            id: Uuid::new_v4(),
            vuln_hash,
            ip: row.ip.trim().to_string(),
            hostname: row.hostname.trim().to_string(),
            nvt_name: row.nvt_name.trim().to_string(),
            severity: row.severity,
            cvss: row.cvss,
            cves: row.cves,
            month,
            status,
            original_severity: row.severity,
            severity_manually_changed: false,
            original_status: status,
            status_manually_changed: false,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute the identity hash from the stored fields
    pub fn recompute_hash(&self) -> String {
        compute_vuln_hash(&self.ip, &self.hostname, &self.nvt_name, &self.cves)
    }

    /// Apply a manual severity override.
    ///
    /// Captures the original severity on the first override only and marks the
    /// field as manually changed so later reconciliation leaves it alone.
    /// Returns the previous value.
    pub fn override_severity(&mut self, new_severity: Severity) -> Severity {
        let old = self.severity;
        if !self.severity_manually_changed {
            self.original_severity = old;
            self.severity_manually_changed = true;
        }
        self.severity = new_severity;
        self.updated_at = Utc::now();
        old
    }

    /// Apply a manual status override. Same stickiness rules as severity.
    pub fn override_status(&mut self, new_status: VulnStatus) -> VulnStatus {
        let old = self.status;
        if !self.status_manually_changed {
            self.original_status = old;
            self.status_manually_changed = true;
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        old
    }

    /// Reset a manually-overridden field back to its original value.
    ///
    /// Returns the value that was in effect before the reset, or `None` if the
    /// field was never manually changed.
    pub fn reset_override(&mut self, field: ChangedField) -> Option<String> {
        match field {
            ChangedField::Severity => {
                if !self.severity_manually_changed {
                    return None;
                }
                let old = self.severity;
                self.severity = self.original_severity;
                self.severity_manually_changed = false;
                self.updated_at = Utc::now();
                Some(old.as_str().to_string())
            }
            ChangedField::Status => {
                if !self.status_manually_changed {
                    return None;
                }
                let old = self.status;
                self.status = self.original_status;
                self.status_manually_changed = false;
                self.updated_at = Utc::now();
                Some(old.as_str().to_string())
            }
        }
    }
}

/// A saved column-name and severity-label mapping, reusable across uploads
/// from the same scanner type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTemplate {
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Scanner source label (e.g. "OpenVAS")
    pub source: String,
    /// Raw column name → canonical field name
    pub column_mapping: BTreeMap<String, String>,
    /// Raw severity label → canonical severity label
    pub severity_map: BTreeMap<String, String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScanTemplate {
    pub fn new(
        name: String,
        source: String,
        column_mapping: BTreeMap<String, String>,
        severity_map: BTreeMap<String, String>,
        created_by: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            source,
            column_mapping,
            severity_map,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Immutable record of a manual field change on a vulnerability record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeHistoryEntry {
    pub id: Uuid,
    /// Record the change was applied to
    pub record_id: Uuid,
    /// Identity hash of that record, for hash-based lookups
    pub vuln_hash: String,
    pub field: ChangedField,
    pub old_value: String,
    pub new_value: String,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub reason: Option<String>,
}

impl ChangeHistoryEntry {
    pub fn new(
        record: &VulnerabilityRecord,
        field: ChangedField,
        old_value: String,
        new_value: String,
        changed_by: &str,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id: record.id,
            vuln_hash: record.vuln_hash.clone(),
            field,
            old_value,
            new_value,
            changed_by: changed_by.to_string(),
            changed_at: Utc::now(),
            reason,
        }
    }
}
