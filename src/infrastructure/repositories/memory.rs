//! In-memory repository implementations
//!
//! Suitable for tests and single-process embedding. `commit_snapshot` holds
//! the write lock across both passes, so a snapshot is observed all-or-nothing
//! by other tasks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::vulnerability::entities::{
    ChangeHistoryEntry, ScanTemplate, VulnerabilityRecord,
};
use crate::domain::vulnerability::errors::VulnerabilityError;
use crate::domain::vulnerability::repositories::{
    IChangeHistoryRepository, ITemplateRepository, IVulnerabilityRepository,
};
use crate::domain::vulnerability::value_objects::{MonthLabel, VulnStatus};

/// In-memory vulnerability record store
#[derive(Default)]
pub struct InMemoryVulnerabilityRepository {
    records: Arc<RwLock<HashMap<Uuid, VulnerabilityRecord>>>,
}

impl InMemoryVulnerabilityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (test helper)
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Pick the record with the greatest (month, created_at) pair
fn latest<'a, I>(records: I) -> Option<&'a VulnerabilityRecord>
where
    I: Iterator<Item = &'a VulnerabilityRecord>,
{
    records.max_by(|a, b| {
        a.month
            .cmp(&b.month)
            .then_with(|| a.created_at.cmp(&b.created_at))
    })
}

#[async_trait]
impl IVulnerabilityRepository for InMemoryVulnerabilityRepository {
    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<VulnerabilityRecord>, VulnerabilityError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_latest_by_hash(
        &self,
        vuln_hash: &str,
    ) -> Result<Option<VulnerabilityRecord>, VulnerabilityError> {
        let records = self.records.read().await;
        Ok(latest(records.values().filter(|r| r.vuln_hash == vuln_hash)).cloned())
    }

    async fn find_latest_by_hash_before(
        &self,
        vuln_hash: &str,
        month: &MonthLabel,
    ) -> Result<Option<VulnerabilityRecord>, VulnerabilityError> {
        let records = self.records.read().await;
        Ok(latest(
            records
                .values()
                .filter(|r| r.vuln_hash == vuln_hash && r.month < *month),
        )
        .cloned())
    }

    async fn find_open_by_month(
        &self,
        month: &MonthLabel,
    ) -> Result<Vec<VulnerabilityRecord>, VulnerabilityError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.month == *month && r.status.is_open())
            .cloned()
            .collect())
    }

    async fn commit_snapshot(
        &self,
        inserts: &[VulnerabilityRecord],
        close_ids: &[Uuid],
    ) -> Result<u64, VulnerabilityError> {
        let mut records = self.records.write().await;

        let mut closed = 0u64;
        for id in close_ids {
            if let Some(record) = records.get_mut(id) {
                if record.status != VulnStatus::Closed {
                    record.status = VulnStatus::Closed;
                    record.updated_at = chrono::Utc::now();
                    closed += 1;
                }
            }
        }

        for record in inserts {
            records.insert(record.id, record.clone());
        }

        Ok(closed)
    }

    async fn update(&self, record: &VulnerabilityRecord) -> Result<(), VulnerabilityError> {
        let mut records = self.records.write().await;
        if !records.contains_key(&record.id) {
            return Err(VulnerabilityError::RecordNotFound {
                id: record.id.to_string(),
            });
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn list_months(&self) -> Result<Vec<MonthLabel>, VulnerabilityError> {
        let records = self.records.read().await;
        let mut months: Vec<MonthLabel> = records.values().map(|r| r.month.clone()).collect();
        months.sort();
        months.dedup();
        months.reverse();
        Ok(months)
    }
}

/// In-memory template store
#[derive(Default)]
pub struct InMemoryTemplateRepository {
    templates: Arc<RwLock<HashMap<Uuid, ScanTemplate>>>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ITemplateRepository for InMemoryTemplateRepository {
    async fn create(&self, template: &ScanTemplate) -> Result<(), VulnerabilityError> {
        self.templates
            .write()
            .await
            .insert(template.id, template.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<ScanTemplate>, VulnerabilityError> {
        Ok(self.templates.read().await.get(id).cloned())
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<ScanTemplate>, VulnerabilityError> {
        let templates = self.templates.read().await;
        let mut all: Vec<ScanTemplate> = templates.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update(&self, template: &ScanTemplate) -> Result<(), VulnerabilityError> {
        let mut templates = self.templates.write().await;
        if !templates.contains_key(&template.id) {
            return Err(VulnerabilityError::TemplateNotFound {
                id: template.id.to_string(),
            });
        }
        templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<(), VulnerabilityError> {
        let mut templates = self.templates.write().await;
        templates
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| VulnerabilityError::TemplateNotFound { id: id.to_string() })
    }
}

/// In-memory change history store (append-only)
#[derive(Default)]
pub struct InMemoryChangeHistoryRepository {
    entries: Arc<RwLock<Vec<ChangeHistoryEntry>>>,
}

impl InMemoryChangeHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IChangeHistoryRepository for InMemoryChangeHistoryRepository {
    async fn append(&self, entry: &ChangeHistoryEntry) -> Result<(), VulnerabilityError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn find_by_record(
        &self,
        record_id: &Uuid,
    ) -> Result<Vec<ChangeHistoryEntry>, VulnerabilityError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.record_id == *record_id)
            .cloned()
            .collect())
    }

    async fn list_all(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ChangeHistoryEntry>, VulnerabilityError> {
        let entries = self.entries.read().await;
        let mut all: Vec<ChangeHistoryEntry> = entries.clone();
        all.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}
