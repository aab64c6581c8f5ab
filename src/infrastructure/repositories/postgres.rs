//! SQLx implementations of the vulnerability repositories
//!
//! Severity, status, and month labels are stored as text and validated back
//! into their value objects on read. CVE lists are `TEXT[]`; template mappings
//! are JSONB.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::vulnerability::entities::{
    ChangeHistoryEntry, ScanTemplate, VulnerabilityRecord,
};
use crate::domain::vulnerability::errors::VulnerabilityError;
use crate::domain::vulnerability::repositories::{
    IChangeHistoryRepository, ITemplateRepository, IVulnerabilityRepository,
};
use crate::domain::vulnerability::value_objects::{
    ChangedField, MonthLabel, Severity, VulnStatus,
};

fn db_error(context: &str, e: impl std::fmt::Display) -> VulnerabilityError {
    tracing::error!("Database error {}: {}", context, e);
    VulnerabilityError::DatabaseError {
        message: e.to_string(),
    }
}

/// A stored label that no longer parses means the row was written outside the
/// application; surface it as a database error rather than a validation one.
fn corrupt(column: &str, value: &str) -> VulnerabilityError {
    tracing::error!("Corrupt {} value in database: {}", column, value);
    VulnerabilityError::DatabaseError {
        message: format!("corrupt {column} value: {value}"),
    }
}

#[derive(sqlx::FromRow)]
struct VulnerabilityRow {
    id: Uuid,
    vuln_hash: String,
    ip: String,
    hostname: String,
    nvt_name: String,
    severity: String,
    cvss: Option<f64>,
    cves: Vec<String>,
    month: String,
    status: String,
    original_severity: String,
    severity_manually_changed: bool,
    original_status: String,
    status_manually_changed: bool,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VulnerabilityRow> for VulnerabilityRecord {
    type Error = VulnerabilityError;

    fn try_from(row: VulnerabilityRow) -> Result<Self, Self::Error> {
        Ok(VulnerabilityRecord {
            id: row.id,
            vuln_hash: row.vuln_hash,
            ip: row.ip,
            hostname: row.hostname,
            nvt_name: row.nvt_name,
            severity: Severity::parse(&row.severity)
                .ok_or_else(|| corrupt("severity", &row.severity))?,
            cvss: row.cvss,
            cves: row.cves,
            month: MonthLabel::parse(&row.month).map_err(|_| corrupt("month", &row.month))?,
            status: VulnStatus::parse(&row.status).ok_or_else(|| corrupt("status", &row.status))?,
            original_severity: Severity::parse(&row.original_severity)
                .ok_or_else(|| corrupt("original_severity", &row.original_severity))?,
            severity_manually_changed: row.severity_manually_changed,
            original_status: VulnStatus::parse(&row.original_status)
                .ok_or_else(|| corrupt("original_status", &row.original_status))?,
            status_manually_changed: row.status_manually_changed,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const RECORD_COLUMNS: &str = "id, vuln_hash, ip, hostname, nvt_name, severity, cvss, cves, \
     month, status, original_severity, severity_manually_changed, original_status, \
     status_manually_changed, created_by, created_at, updated_at";

/// SQLx implementation of the vulnerability record repository
pub struct SqlxVulnerabilityRepository {
    pool: Arc<PgPool>,
}

impl SqlxVulnerabilityRepository {
    /// Create a new SQLx vulnerability repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IVulnerabilityRepository for SqlxVulnerabilityRepository {
    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<VulnerabilityRecord>, VulnerabilityError> {
        let row = sqlx::query_as::<_, VulnerabilityRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM vulnerabilities WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| db_error("finding vulnerability by id", e))?;

        row.map(VulnerabilityRecord::try_from).transpose()
    }

    async fn find_latest_by_hash(
        &self,
        vuln_hash: &str,
    ) -> Result<Option<VulnerabilityRecord>, VulnerabilityError> {
        let row = sqlx::query_as::<_, VulnerabilityRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM vulnerabilities \
             WHERE vuln_hash = $1 \
             ORDER BY month DESC, created_at DESC \
             LIMIT 1"
        ))
        .bind(vuln_hash)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| db_error("finding latest vulnerability by hash", e))?;

        row.map(VulnerabilityRecord::try_from).transpose()
    }

    async fn find_latest_by_hash_before(
        &self,
        vuln_hash: &str,
        month: &MonthLabel,
    ) -> Result<Option<VulnerabilityRecord>, VulnerabilityError> {
        // Zero-padded YYYY-MM compares chronologically as text
        let row = sqlx::query_as::<_, VulnerabilityRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM vulnerabilities \
             WHERE vuln_hash = $1 AND month < $2 \
             ORDER BY month DESC, created_at DESC \
             LIMIT 1"
        ))
        .bind(vuln_hash)
        .bind(month.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| db_error("finding prior vulnerability by hash", e))?;

        row.map(VulnerabilityRecord::try_from).transpose()
    }

    async fn find_open_by_month(
        &self,
        month: &MonthLabel,
    ) -> Result<Vec<VulnerabilityRecord>, VulnerabilityError> {
        let rows = sqlx::query_as::<_, VulnerabilityRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM vulnerabilities \
             WHERE month = $1 AND status <> 'closed' \
             ORDER BY created_at"
        ))
        .bind(month.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| db_error("listing open vulnerabilities for month", e))?;

        rows.into_iter()
            .map(VulnerabilityRecord::try_from)
            .collect()
    }

    async fn commit_snapshot(
        &self,
        inserts: &[VulnerabilityRecord],
        close_ids: &[Uuid],
    ) -> Result<u64, VulnerabilityError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("starting snapshot transaction", e))?;

        let closed = sqlx::query(
            "UPDATE vulnerabilities \
             SET status = 'closed', updated_at = NOW() \
             WHERE id = ANY($1) AND status <> 'closed'",
        )
        .bind(close_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("closing prior vulnerabilities", e))?
        .rows_affected();

        for record in inserts {
            sqlx::query(&format!(
                "INSERT INTO vulnerabilities ({RECORD_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
            ))
            .bind(record.id)
            .bind(&record.vuln_hash)
            .bind(&record.ip)
            .bind(&record.hostname)
            .bind(&record.nvt_name)
            .bind(record.severity.as_str())
            .bind(record.cvss)
            .bind(&record.cves)
            .bind(record.month.as_str())
            .bind(record.status.as_str())
            .bind(record.original_severity.as_str())
            .bind(record.severity_manually_changed)
            .bind(record.original_status.as_str())
            .bind(record.status_manually_changed)
            .bind(&record.created_by)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("inserting vulnerability record", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("committing snapshot transaction", e))?;

        Ok(closed)
    }

    async fn update(&self, record: &VulnerabilityRecord) -> Result<(), VulnerabilityError> {
        let result = sqlx::query(
            "UPDATE vulnerabilities \
             SET severity = $2, status = $3, \
                 original_severity = $4, severity_manually_changed = $5, \
                 original_status = $6, status_manually_changed = $7, \
                 updated_at = $8 \
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(record.severity.as_str())
        .bind(record.status.as_str())
        .bind(record.original_severity.as_str())
        .bind(record.severity_manually_changed)
        .bind(record.original_status.as_str())
        .bind(record.status_manually_changed)
        .bind(record.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("updating vulnerability record", e))?;

        if result.rows_affected() == 0 {
            return Err(VulnerabilityError::RecordNotFound {
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_months(&self) -> Result<Vec<MonthLabel>, VulnerabilityError> {
        let months: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT month FROM vulnerabilities ORDER BY month DESC")
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| db_error("listing months", e))?;

        months
            .into_iter()
            .map(|(m,)| MonthLabel::parse(&m).map_err(|_| corrupt("month", &m)))
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    name: String,
    source: String,
    column_mapping: serde_json::Value,
    severity_map: serde_json::Value,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for ScanTemplate {
    type Error = VulnerabilityError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let column_mapping: BTreeMap<String, String> =
            serde_json::from_value(row.column_mapping)
                .map_err(|e| db_error("decoding template column mapping", e))?;
        let severity_map: BTreeMap<String, String> = serde_json::from_value(row.severity_map)
            .map_err(|e| db_error("decoding template severity map", e))?;

        Ok(ScanTemplate {
            id: row.id,
            name: row.name,
            source: row.source,
            column_mapping,
            severity_map,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn mapping_json(mapping: &BTreeMap<String, String>) -> serde_json::Value {
    serde_json::to_value(mapping).unwrap_or(serde_json::Value::Null)
}

/// SQLx implementation of the scan template repository
pub struct SqlxTemplateRepository {
    pool: Arc<PgPool>,
}

impl SqlxTemplateRepository {
    /// Create a new SQLx template repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ITemplateRepository for SqlxTemplateRepository {
    async fn create(&self, template: &ScanTemplate) -> Result<(), VulnerabilityError> {
        sqlx::query(
            "INSERT INTO scan_templates \
             (id, name, source, column_mapping, severity_map, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.source)
        .bind(mapping_json(&template.column_mapping))
        .bind(mapping_json(&template.severity_map))
        .bind(&template.created_by)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("creating scan template", e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<ScanTemplate>, VulnerabilityError> {
        let row = sqlx::query_as::<_, TemplateRow>(
            "SELECT id, name, source, column_mapping, severity_map, \
                    created_by, created_at, updated_at \
             FROM scan_templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| db_error("finding scan template by id", e))?;

        row.map(ScanTemplate::try_from).transpose()
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<ScanTemplate>, VulnerabilityError> {
        let rows = sqlx::query_as::<_, TemplateRow>(
            "SELECT id, name, source, column_mapping, severity_map, \
                    created_by, created_at, updated_at \
             FROM scan_templates \
             ORDER BY created_at \
             OFFSET $1 LIMIT $2",
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| db_error("listing scan templates", e))?;

        rows.into_iter().map(ScanTemplate::try_from).collect()
    }

    async fn update(&self, template: &ScanTemplate) -> Result<(), VulnerabilityError> {
        let result = sqlx::query(
            "UPDATE scan_templates \
             SET name = $2, source = $3, column_mapping = $4, severity_map = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.source)
        .bind(mapping_json(&template.column_mapping))
        .bind(mapping_json(&template.severity_map))
        .bind(template.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("updating scan template", e))?;

        if result.rows_affected() == 0 {
            return Err(VulnerabilityError::TemplateNotFound {
                id: template.id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<(), VulnerabilityError> {
        let result = sqlx::query("DELETE FROM scan_templates WHERE id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("deleting scan template", e))?;

        if result.rows_affected() == 0 {
            return Err(VulnerabilityError::TemplateNotFound { id: id.to_string() });
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ChangeHistoryRow {
    id: Uuid,
    record_id: Uuid,
    vuln_hash: String,
    field: String,
    old_value: String,
    new_value: String,
    changed_by: String,
    changed_at: DateTime<Utc>,
    reason: Option<String>,
}

impl TryFrom<ChangeHistoryRow> for ChangeHistoryEntry {
    type Error = VulnerabilityError;

    fn try_from(row: ChangeHistoryRow) -> Result<Self, Self::Error> {
        let field = match row.field.as_str() {
            "severity" => ChangedField::Severity,
            "status" => ChangedField::Status,
            other => return Err(corrupt("field", other)),
        };
        Ok(ChangeHistoryEntry {
            id: row.id,
            record_id: row.record_id,
            vuln_hash: row.vuln_hash,
            field,
            old_value: row.old_value,
            new_value: row.new_value,
            changed_by: row.changed_by,
            changed_at: row.changed_at,
            reason: row.reason,
        })
    }
}

/// SQLx implementation of the change history repository
pub struct SqlxChangeHistoryRepository {
    pool: Arc<PgPool>,
}

impl SqlxChangeHistoryRepository {
    /// Create a new SQLx change history repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

const HISTORY_COLUMNS: &str =
    "id, record_id, vuln_hash, field, old_value, new_value, changed_by, changed_at, reason";

#[async_trait]
impl IChangeHistoryRepository for SqlxChangeHistoryRepository {
    async fn append(&self, entry: &ChangeHistoryEntry) -> Result<(), VulnerabilityError> {
        sqlx::query(&format!(
            "INSERT INTO change_history ({HISTORY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(entry.id)
        .bind(entry.record_id)
        .bind(&entry.vuln_hash)
        .bind(entry.field.as_str())
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(&entry.changed_by)
        .bind(entry.changed_at)
        .bind(&entry.reason)
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("appending change history entry", e))?;

        Ok(())
    }

    async fn find_by_record(
        &self,
        record_id: &Uuid,
    ) -> Result<Vec<ChangeHistoryEntry>, VulnerabilityError> {
        let rows = sqlx::query_as::<_, ChangeHistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM change_history \
             WHERE record_id = $1 \
             ORDER BY changed_at"
        ))
        .bind(record_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| db_error("listing change history for record", e))?;

        rows.into_iter().map(ChangeHistoryEntry::try_from).collect()
    }

    async fn list_all(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ChangeHistoryEntry>, VulnerabilityError> {
        let rows = sqlx::query_as::<_, ChangeHistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM change_history \
             ORDER BY changed_at DESC \
             OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| db_error("listing change history", e))?;

        rows.into_iter().map(ChangeHistoryEntry::try_from).collect()
    }
}
