//! Vulnerability repository traits

use async_trait::async_trait;
use uuid::Uuid;

use super::entities::{ChangeHistoryEntry, ScanTemplate, VulnerabilityRecord};
use super::errors::VulnerabilityError;
use super::value_objects::MonthLabel;

/// Repository trait for vulnerability record persistence
///
/// The reconciliation engine performs its reads through the find methods and
/// commits each upload through [`commit_snapshot`](Self::commit_snapshot),
/// which must apply the row inserts and the close pass atomically.
#[async_trait]
pub trait IVulnerabilityRepository: Send + Sync {
    /// Find a record by primary id
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<VulnerabilityRecord>, VulnerabilityError>;

    /// Find the most recent record with this hash, across all months
    async fn find_latest_by_hash(
        &self,
        vuln_hash: &str,
    ) -> Result<Option<VulnerabilityRecord>, VulnerabilityError>;

    /// Find the most recent record with this hash in a month strictly before
    /// `month`
    async fn find_latest_by_hash_before(
        &self,
        vuln_hash: &str,
        month: &MonthLabel,
    ) -> Result<Option<VulnerabilityRecord>, VulnerabilityError>;

    /// All non-closed records belonging to the given monthly snapshot
    async fn find_open_by_month(
        &self,
        month: &MonthLabel,
    ) -> Result<Vec<VulnerabilityRecord>, VulnerabilityError>;

    /// Atomically insert a month's records and close the given prior records.
    ///
    /// Both passes happen in one transaction: either the whole snapshot
    /// commits or nothing does. Returns the number of records closed.
    async fn commit_snapshot(
        &self,
        inserts: &[VulnerabilityRecord],
        close_ids: &[Uuid],
    ) -> Result<u64, VulnerabilityError>;

    /// Persist severity/status/override-flag mutations of an existing record
    async fn update(&self, record: &VulnerabilityRecord) -> Result<(), VulnerabilityError>;

    /// Distinct month labels with at least one record, most recent first
    async fn list_months(&self) -> Result<Vec<MonthLabel>, VulnerabilityError>;
}

/// Repository trait for scan template persistence
#[async_trait]
pub trait ITemplateRepository: Send + Sync {
    async fn create(&self, template: &ScanTemplate) -> Result<(), VulnerabilityError>;

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<ScanTemplate>, VulnerabilityError>;

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<ScanTemplate>, VulnerabilityError>;

    async fn update(&self, template: &ScanTemplate) -> Result<(), VulnerabilityError>;

    async fn delete(&self, id: &Uuid) -> Result<(), VulnerabilityError>;
}

/// Repository trait for manual change history
///
/// Entries are append-only; there is no update or delete.
#[async_trait]
pub trait IChangeHistoryRepository: Send + Sync {
    async fn append(&self, entry: &ChangeHistoryEntry) -> Result<(), VulnerabilityError>;

    /// History for one record, oldest first
    async fn find_by_record(
        &self,
        record_id: &Uuid,
    ) -> Result<Vec<ChangeHistoryEntry>, VulnerabilityError>;

    /// History across all records, most recent first
    async fn list_all(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ChangeHistoryEntry>, VulnerabilityError>;
}
