//! Ingestion use cases
//!
//! `UploadScanUseCase` runs the full pipeline: parse CSV, map columns,
//! normalize rows, reconcile statuses against prior months, and commit the
//! snapshot in one transaction. `ValidateTemplateUseCase` is the dry-run
//! variant: it reports what an upload through a template would do without
//! persisting anything.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::IngestionConfig;
use crate::domain::vulnerability::entities::VulnerabilityRecord;
use crate::domain::vulnerability::errors::VulnerabilityError;
use crate::domain::vulnerability::repositories::{ITemplateRepository, IVulnerabilityRepository};
use crate::domain::vulnerability::value_objects::{CanonicalField, MonthLabel, VulnStatus};
use crate::infrastructure::csv::CsvDocument;
use crate::infrastructure::mapping::{ColumnMapper, ColumnMapping};

use super::normalize::normalize_rows;
use super::reconcile::{assign_status, close_set, dedupe_last_wins};

/// How an upload chooses its column mapping
#[derive(Debug, Clone)]
pub enum TemplateSelector {
    /// Use a saved template by id
    Template(Uuid),
    /// Auto-detect the mapping from the CSV header row
    AutoDetect,
}

/// Result of a committed upload
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub month: String,
    /// Data rows in the uploaded file
    pub total_rows: usize,
    /// Records persisted for this snapshot
    pub inserted: usize,
    pub new: usize,
    pub ongoing: usize,
    pub reopened: usize,
    /// Prior-month records closed by the reconciliation pass
    pub closed: u64,
    /// Rows dropped for missing required fields
    pub skipped: usize,
    /// Rows collapsed into an earlier row with the same identity hash
    pub duplicates: usize,
    pub warnings: Vec<String>,
}

/// Shape of the uploaded CSV, echoed back in validation reports
#[derive(Debug, Clone, Default, Serialize)]
pub struct CsvInfo {
    pub columns: Vec<String>,
    pub rows: usize,
}

/// Dry-run validation result
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub csv_info: CsvInfo,
}

/// Use case for ingesting one monthly scan upload
pub struct UploadScanUseCase {
    vulnerabilities: Arc<dyn IVulnerabilityRepository>,
    templates: Arc<dyn ITemplateRepository>,
    mapper: ColumnMapper,
    config: IngestionConfig,
}

impl UploadScanUseCase {
    pub fn new(
        vulnerabilities: Arc<dyn IVulnerabilityRepository>,
        templates: Arc<dyn ITemplateRepository>,
        mapper: ColumnMapper,
        config: IngestionConfig,
    ) -> Self {
        Self {
            vulnerabilities,
            templates,
            mapper,
            config,
        }
    }

    /// Ingest a CSV upload for the given snapshot month.
    ///
    /// Phase 1 reads prior state and computes statuses plus the close set;
    /// phase 2 commits row inserts and closures through one repository
    /// transaction. Nothing is persisted on any error.
    #[instrument(skip(self, csv_bytes), fields(month = %month, created_by = %created_by))]
    pub async fn execute(
        &self,
        csv_bytes: &[u8],
        selector: TemplateSelector,
        month: &str,
        created_by: &str,
    ) -> Result<ImportSummary, VulnerabilityError> {
        let month = MonthLabel::parse(month)?;
        let doc = CsvDocument::parse(csv_bytes)?;

        if doc.row_count() > self.config.max_rows {
            return Err(VulnerabilityError::TooManyRows {
                rows: doc.row_count(),
                max_rows: self.config.max_rows,
            });
        }

        let (mapping, severity_map) = self.resolve_mapping(&selector, doc.headers()).await?;

        let outcome = normalize_rows(
            &doc,
            &mapping,
            &severity_map,
            &self.mapper,
            self.config.strict,
        );
        if self.config.strict && !outcome.errors.is_empty() {
            return Err(VulnerabilityError::ValidationFailed {
                errors: outcome.errors,
            });
        }

        let (rows, duplicates) = dedupe_last_wins(outcome.rows);

        // Phase 1: read prior state and assign statuses
        let mut records = Vec::with_capacity(rows.len());
        let mut summary = ImportSummary {
            month: month.to_string(),
            total_rows: doc.row_count(),
            skipped: outcome.skipped,
            duplicates,
            warnings: outcome.warnings,
            ..ImportSummary::default()
        };

        for row in rows {
            let hash = row.vuln_hash();
            let prior = self
                .vulnerabilities
                .find_latest_by_hash_before(&hash, &month)
                .await?;
            let status = assign_status(prior.as_ref());
            match status {
                VulnStatus::New => summary.new += 1,
                VulnStatus::Ongoing => summary.ongoing += 1,
                VulnStatus::Reopened => summary.reopened += 1,
                VulnStatus::Closed => {}
            }
            records.push(VulnerabilityRecord::from_row(
                row,
                month.clone(),
                status,
                created_by,
            ));
        }

        let prev_open = self
            .vulnerabilities
            .find_open_by_month(&month.prev())
            .await?;
        let batch_hashes: HashSet<String> =
            records.iter().map(|r| r.vuln_hash.clone()).collect();
        let close_ids = close_set(&prev_open, &batch_hashes);

        // Phase 2: commit inserts and closures atomically
        summary.closed = self
            .vulnerabilities
            .commit_snapshot(&records, &close_ids)
            .await?;
        summary.inserted = records.len();

        info!(
            month = %summary.month,
            inserted = summary.inserted,
            new = summary.new,
            ongoing = summary.ongoing,
            reopened = summary.reopened,
            closed = summary.closed,
            skipped = summary.skipped,
            duplicates = summary.duplicates,
            "scan upload committed"
        );

        Ok(summary)
    }

    async fn resolve_mapping(
        &self,
        selector: &TemplateSelector,
        headers: &[String],
    ) -> Result<(ColumnMapping, BTreeMap<String, String>), VulnerabilityError> {
        match selector {
            TemplateSelector::AutoDetect => {
                Ok((self.mapper.auto_detect(headers)?, BTreeMap::new()))
            }
            TemplateSelector::Template(id) => {
                let template = self.templates.find_by_id(id).await?.ok_or_else(|| {
                    VulnerabilityError::TemplateNotFound { id: id.to_string() }
                })?;

                let resolution = self.mapper.resolve_template(&template, headers);
                let missing = resolution.mapping.missing_required();
                if !missing.is_empty() {
                    return Err(VulnerabilityError::RequiredFieldsMissing {
                        missing: missing.iter().map(|f| f.as_str().to_string()).collect(),
                        available: headers.to_vec(),
                    });
                }

                Ok((resolution.mapping, template.severity_map))
            }
        }
    }
}

/// Use case for validating a template against a CSV without persisting
pub struct ValidateTemplateUseCase {
    templates: Arc<dyn ITemplateRepository>,
    mapper: ColumnMapper,
}

impl ValidateTemplateUseCase {
    pub fn new(templates: Arc<dyn ITemplateRepository>, mapper: ColumnMapper) -> Self {
        Self { templates, mapper }
    }

    /// Check whether an upload through `template_id` would succeed.
    ///
    /// Malformed CSV and mapping problems become report entries rather than
    /// errors; only a missing template is an error.
    #[instrument(skip(self, csv_bytes), fields(template_id = %template_id))]
    pub async fn execute(
        &self,
        csv_bytes: &[u8],
        template_id: &Uuid,
    ) -> Result<ValidationReport, VulnerabilityError> {
        let template = self
            .templates
            .find_by_id(template_id)
            .await?
            .ok_or_else(|| VulnerabilityError::TemplateNotFound {
                id: template_id.to_string(),
            })?;

        let doc = match CsvDocument::parse(csv_bytes) {
            Ok(doc) => doc,
            Err(err) => {
                return Ok(ValidationReport {
                    valid: false,
                    errors: vec![err.to_string()],
                    ..ValidationReport::default()
                });
            }
        };

        let mut report = ValidationReport {
            csv_info: CsvInfo {
                columns: doc.headers().to_vec(),
                rows: doc.row_count(),
            },
            ..ValidationReport::default()
        };

        let resolution = self.mapper.resolve_template(&template, doc.headers());

        for field in resolution.mapping.missing_required() {
            report.errors.push(format!(
                "required field '{}' has no source column in this CSV",
                field
            ));
        }
        for column in &resolution.missing_columns {
            report.errors.push(format!(
                "template maps column '{}' which is not present in the CSV",
                column
            ));
        }
        for value in &resolution.invalid_fields {
            report.errors.push(format!(
                "template maps onto unknown canonical field '{}'",
                value
            ));
        }

        match resolution.mapping.get(CanonicalField::Severity) {
            Some(col) => {
                let mut seen = HashSet::new();
                for row in doc.rows() {
                    let label = doc.field(row, col.index).trim().to_string();
                    if label.is_empty() || !seen.insert(label.clone()) {
                        continue;
                    }
                    if let Err(err) = self.mapper.map_severity(&label, &template.severity_map) {
                        report.errors.push(err.to_string());
                    }
                }
            }
            None => {
                report.warnings.push(
                    "no severity column mapped; severities will default to Medium".to_string(),
                );
            }
        }

        for field in [
            CanonicalField::Hostname,
            CanonicalField::Cvss,
            CanonicalField::Cves,
        ] {
            if resolution.mapping.get(field).is_none() {
                report
                    .warnings
                    .push(format!("optional field '{}' has no source column", field));
            }
        }

        report.valid = report.errors.is_empty();
        Ok(report)
    }
}
