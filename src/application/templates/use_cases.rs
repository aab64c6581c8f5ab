//! Template use cases
//!
//! CRUD over saved column-mapping templates plus auto-creation from a sample
//! CSV. Explicit definitions are validated before saving: mapped targets and
//! severity values must be canonical, and the required fields must be covered.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::vulnerability::entities::ScanTemplate;
use crate::domain::vulnerability::errors::VulnerabilityError;
use crate::domain::vulnerability::repositories::ITemplateRepository;
use crate::domain::vulnerability::value_objects::{CanonicalField, Severity};
use crate::infrastructure::csv::CsvDocument;
use crate::infrastructure::mapping::{ColumnMapper, MappingAnalysis};

/// Caller-supplied template definition
#[derive(Debug, Clone)]
pub struct TemplateDefinition {
    pub name: String,
    pub source: String,
    pub column_mapping: BTreeMap<String, String>,
    pub severity_map: BTreeMap<String, String>,
}

impl TemplateDefinition {
    /// Validate the definition against the canonical schema
    fn validate(&self) -> Result<(), VulnerabilityError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("template name cannot be empty".to_string());
        }

        let mut mapped_fields = Vec::new();
        for (raw, canonical) in &self.column_mapping {
            match CanonicalField::parse(canonical) {
                Some(field) => mapped_fields.push(field),
                None => errors.push(format!(
                    "column '{}' maps onto unknown canonical field '{}'",
                    raw, canonical
                )),
            }
        }

        for required in CanonicalField::REQUIRED {
            if !mapped_fields.contains(&required) {
                errors.push(format!(
                    "required field '{}' has no source column",
                    required
                ));
            }
        }

        for (raw, canonical) in &self.severity_map {
            if Severity::parse(canonical).is_none() {
                errors.push(format!(
                    "severity label '{}' maps onto unknown severity '{}'",
                    raw, canonical
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(VulnerabilityError::ValidationFailed { errors })
        }
    }
}

/// Use case for creating a template from an explicit definition
pub struct CreateTemplateUseCase {
    templates: Arc<dyn ITemplateRepository>,
}

impl CreateTemplateUseCase {
    pub fn new(templates: Arc<dyn ITemplateRepository>) -> Self {
        Self { templates }
    }

    #[instrument(skip(self, definition), fields(name = %definition.name, created_by = %created_by))]
    pub async fn execute(
        &self,
        definition: TemplateDefinition,
        created_by: &str,
    ) -> Result<ScanTemplate, VulnerabilityError> {
        definition.validate()?;

        let template = ScanTemplate::new(
            definition.name,
            definition.source,
            definition.column_mapping,
            definition.severity_map,
            created_by,
        );
        self.templates.create(&template).await?;

        info!(template_id = %template.id, "template created");
        Ok(template)
    }
}

/// Result of auto-creating a template from a sample CSV
#[derive(Debug, Clone)]
pub struct AutoCreateTemplateResult {
    pub template: ScanTemplate,
    pub analysis: MappingAnalysis,
}

/// Use case for auto-creating a template from a sample CSV
///
/// Runs auto-detection over the sample's header row and derives the severity
/// map from the distinct labels in the detected severity column.
pub struct AutoCreateTemplateUseCase {
    templates: Arc<dyn ITemplateRepository>,
    mapper: ColumnMapper,
}

impl AutoCreateTemplateUseCase {
    pub fn new(templates: Arc<dyn ITemplateRepository>, mapper: ColumnMapper) -> Self {
        Self { templates, mapper }
    }

    #[instrument(skip(self, csv_bytes), fields(name = %name, created_by = %created_by))]
    pub async fn execute(
        &self,
        csv_bytes: &[u8],
        name: &str,
        source: &str,
        created_by: &str,
    ) -> Result<AutoCreateTemplateResult, VulnerabilityError> {
        let doc = CsvDocument::parse(csv_bytes)?;
        let mapping = self.mapper.auto_detect(doc.headers())?;

        let severity_map = match mapping.get(CanonicalField::Severity) {
            Some(col) => {
                let labels: Vec<String> = doc
                    .rows()
                    .iter()
                    .map(|row| doc.field(row, col.index).to_string())
                    .collect();
                self.mapper.derive_severity_map(&labels)
            }
            None => BTreeMap::new(),
        };

        let analysis = self.mapper.analyze(doc.headers(), &mapping);

        let template = ScanTemplate::new(
            name.to_string(),
            source.to_string(),
            mapping.to_template_mapping(),
            severity_map,
            created_by,
        );
        self.templates.create(&template).await?;

        info!(
            template_id = %template.id,
            mapped = analysis.mapped_columns.len(),
            unmapped = analysis.unmapped_columns.len(),
            "template auto-created"
        );

        Ok(AutoCreateTemplateResult { template, analysis })
    }
}

/// Use case for fetching one template
pub struct GetTemplateUseCase {
    templates: Arc<dyn ITemplateRepository>,
}

impl GetTemplateUseCase {
    pub fn new(templates: Arc<dyn ITemplateRepository>) -> Self {
        Self { templates }
    }

    pub async fn execute(&self, id: &Uuid) -> Result<ScanTemplate, VulnerabilityError> {
        self.templates
            .find_by_id(id)
            .await?
            .ok_or_else(|| VulnerabilityError::TemplateNotFound { id: id.to_string() })
    }
}

/// Use case for listing templates, paginated
pub struct ListTemplatesUseCase {
    templates: Arc<dyn ITemplateRepository>,
}

impl ListTemplatesUseCase {
    pub fn new(templates: Arc<dyn ITemplateRepository>) -> Self {
        Self { templates }
    }

    pub async fn execute(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ScanTemplate>, VulnerabilityError> {
        self.templates.list(offset, limit).await
    }
}

/// Use case for updating a template's definition
pub struct UpdateTemplateUseCase {
    templates: Arc<dyn ITemplateRepository>,
}

impl UpdateTemplateUseCase {
    pub fn new(templates: Arc<dyn ITemplateRepository>) -> Self {
        Self { templates }
    }

    #[instrument(skip(self, definition), fields(template_id = %id))]
    pub async fn execute(
        &self,
        id: &Uuid,
        definition: TemplateDefinition,
    ) -> Result<ScanTemplate, VulnerabilityError> {
        definition.validate()?;

        let mut template = self.templates.find_by_id(id).await?.ok_or_else(|| {
            VulnerabilityError::TemplateNotFound { id: id.to_string() }
        })?;

        template.name = definition.name;
        template.source = definition.source;
        template.column_mapping = definition.column_mapping;
        template.severity_map = definition.severity_map;
        template.updated_at = chrono::Utc::now();

        self.templates.update(&template).await?;
        Ok(template)
    }
}

/// Use case for deleting a template
pub struct DeleteTemplateUseCase {
    templates: Arc<dyn ITemplateRepository>,
}

impl DeleteTemplateUseCase {
    pub fn new(templates: Arc<dyn ITemplateRepository>) -> Self {
        Self { templates }
    }

    #[instrument(skip(self), fields(template_id = %id))]
    pub async fn execute(&self, id: &Uuid) -> Result<(), VulnerabilityError> {
        self.templates.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> TemplateDefinition {
        let mut column_mapping = BTreeMap::new();
        column_mapping.insert("IP".to_string(), "ip".to_string());
        column_mapping.insert("NVT Name".to_string(), "nvt_name".to_string());
        let mut severity_map = BTreeMap::new();
        severity_map.insert("Sev1".to_string(), "Critical".to_string());
        TemplateDefinition {
            name: "OpenVAS".to_string(),
            source: "OpenVAS".to_string(),
            column_mapping,
            severity_map,
        }
    }

    #[test]
    fn test_definition_validation_accepts_complete_mapping() {
        assert!(definition().validate().is_ok());
    }

    #[test]
    fn test_definition_validation_rejects_bad_fields() {
        let mut bad = definition();
        bad.column_mapping
            .insert("Extra".to_string(), "not_a_field".to_string());
        bad.severity_map
            .insert("Sev9".to_string(), "Apocalyptic".to_string());
        bad.column_mapping.remove("IP");

        let err = bad.validate().unwrap_err();
        match err {
            VulnerabilityError::ValidationFailed { errors } => {
                assert_eq!(errors.len(), 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
