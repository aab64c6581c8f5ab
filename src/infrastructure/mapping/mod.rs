//! Column auto-detection and severity normalization
//!
//! Translates arbitrary scanner CSV column names into canonical vulnerability
//! fields, either from a saved template or by pattern-based auto-detection,
//! and maps free-text severity labels onto the canonical severity set.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::vulnerability::entities::ScanTemplate;
use crate::domain::vulnerability::errors::VulnerabilityError;
use crate::domain::vulnerability::value_objects::{CanonicalField, Severity};

/// Immutable pattern tables driving auto-detection
///
/// Passed into the mapper at construction so callers can override the
/// built-ins per upload source; there is no module-level mutable state.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Ordered candidate substring patterns per canonical field, lowercase.
    /// Fields are tested in [`CanonicalField::ALL`] order; within a field,
    /// patterns are tested in priority order.
    pub column_patterns: Vec<(CanonicalField, Vec<&'static str>)>,
    /// Ordered substring patterns classifying raw severity labels
    pub severity_patterns: Vec<(&'static str, Severity)>,
    /// Severity assigned when no pattern matches
    pub default_severity: Severity,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            column_patterns: vec![
                (
                    CanonicalField::Ip,
                    vec!["ip address", "ip_address", "ipaddress", "host ip", "ip"],
                ),
                (
                    CanonicalField::Hostname,
                    vec!["hostname", "host name", "netbios", "host"],
                ),
                (
                    CanonicalField::NvtName,
                    vec![
                        "nvt name",
                        "nvt_name",
                        "vulnerability name",
                        "vuln name",
                        "plugin name",
                        "finding name",
                        "nvt",
                        "name",
                        "title",
                    ],
                ),
                (
                    CanonicalField::Severity,
                    vec!["severity", "risk", "threat"],
                ),
                (CanonicalField::Cvss, vec!["cvss score", "cvss"]),
                (CanonicalField::Cves, vec!["cve"]),
            ],
            severity_patterns: vec![
                ("crit", Severity::Critical),
                ("high", Severity::High),
                ("med", Severity::Medium),
                ("low", Severity::Low),
            ],
            default_severity: Severity::Medium,
        }
    }
}

/// A resolved raw-column reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Raw header name as it appears in the CSV
    pub name: String,
    /// Column index in the header row
    pub index: usize,
}

/// Canonical field → source column, resolved against one CSV's headers
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    fields: BTreeMap<CanonicalField, ColumnRef>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<&ColumnRef> {
        self.fields.get(&field)
    }

    pub fn fields(&self) -> &BTreeMap<CanonicalField, ColumnRef> {
        &self.fields
    }

    /// Required canonical fields with no mapped source column
    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::REQUIRED
            .iter()
            .copied()
            .filter(|f| !self.fields.contains_key(f))
            .collect()
    }

    /// Raw column name → canonical field name, as stored in templates
    pub fn to_template_mapping(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(field, col)| (col.name.clone(), field.as_str().to_string()))
            .collect()
    }
}

/// Outcome of resolving a saved template against one CSV's headers
#[derive(Debug, Clone)]
pub struct TemplateResolution {
    pub mapping: ColumnMapping,
    /// Template source columns not present in the CSV
    pub missing_columns: Vec<String>,
    /// Template target values that are not canonical field names
    pub invalid_fields: Vec<String>,
}

/// Analysis of an auto-detection run, reported alongside auto-created templates
#[derive(Debug, Clone, serde::Serialize)]
pub struct MappingAnalysis {
    pub csv_columns: Vec<String>,
    /// Raw column name → canonical field name
    pub mapped_columns: BTreeMap<String, String>,
    pub unmapped_columns: Vec<String>,
}

/// Maps raw CSV columns and severity labels onto the canonical schema
#[derive(Debug, Clone, Default)]
pub struct ColumnMapper {
    config: MapperConfig,
}

impl ColumnMapper {
    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Auto-detect a column mapping from raw header names.
    ///
    /// Two passes over the raw columns in file enumeration order: exact
    /// pattern matches claim their field first, then substring containment
    /// fills the rest. Without the exact pass, short patterns like `ip` would
    /// let an earlier column such as `Description` capture the field from the
    /// real `IP` column. Within a pass, first match wins, not best match.
    /// Fails if a required field ends up with no source column, reporting the
    /// missing fields and every available raw column.
    pub fn auto_detect(&self, headers: &[String]) -> Result<ColumnMapping, VulnerabilityError> {
        let mut mapping = ColumnMapping::default();
        let mut claimed = vec![false; headers.len()];

        for exact in [true, false] {
            for (index, header) in headers.iter().enumerate() {
                if claimed[index] {
                    continue;
                }
                let lowered = header.trim().to_lowercase();
                for (field, patterns) in &self.config.column_patterns {
                    if mapping.fields.contains_key(field) {
                        continue;
                    }
                    let matched = if exact {
                        patterns.iter().any(|p| lowered == *p)
                    } else {
                        patterns.iter().any(|p| lowered.contains(p))
                    };
                    if matched {
                        debug!(column = %header, field = %field, "auto-detected column");
                        mapping.fields.insert(
                            *field,
                            ColumnRef {
                                name: header.clone(),
                                index,
                            },
                        );
                        claimed[index] = true;
                        break;
                    }
                }
            }
        }

        let missing = mapping.missing_required();
        if !missing.is_empty() {
            return Err(VulnerabilityError::RequiredFieldsMissing {
                missing: missing.iter().map(|f| f.as_str().to_string()).collect(),
                available: headers.to_vec(),
            });
        }

        Ok(mapping)
    }

    /// Resolve a saved template against a CSV's headers.
    ///
    /// Header matching is case-insensitive on trimmed names. Never fails:
    /// missing source columns and non-canonical target fields are collected
    /// for the caller to report (an error for an upload, diagnostics for a
    /// dry-run validation).
    pub fn resolve_template(
        &self,
        template: &ScanTemplate,
        headers: &[String],
    ) -> TemplateResolution {
        let mut mapping = ColumnMapping::default();
        let mut missing_columns = Vec::new();
        let mut invalid_fields = Vec::new();

        for (raw, canonical) in &template.column_mapping {
            let Some(field) = CanonicalField::parse(canonical) else {
                invalid_fields.push(canonical.clone());
                continue;
            };

            let raw_lowered = raw.trim().to_lowercase();
            let position = headers
                .iter()
                .position(|h| h.trim().to_lowercase() == raw_lowered);

            match position {
                Some(index) => {
                    mapping.fields.entry(field).or_insert(ColumnRef {
                        name: headers[index].clone(),
                        index,
                    });
                }
                None => missing_columns.push(raw.clone()),
            }
        }

        TemplateResolution {
            mapping,
            missing_columns,
            invalid_fields,
        }
    }

    /// Classify a free-text severity label by substring containment,
    /// case-insensitive, falling back to the configured default.
    pub fn classify_severity(&self, label: &str) -> Severity {
        let lowered = label.trim().to_lowercase();
        for (pattern, severity) in &self.config.severity_patterns {
            if lowered.contains(pattern) {
                return *severity;
            }
        }
        self.config.default_severity
    }

    /// Map a raw severity label through a template's severity map, then the
    /// pattern classifier.
    ///
    /// Returns `Err` with the offending value when the mapped label falls
    /// outside the canonical set; permissive callers recover with
    /// [`classify_severity`](Self::classify_severity).
    pub fn map_severity(
        &self,
        label: &str,
        severity_map: &BTreeMap<String, String>,
    ) -> Result<Severity, VulnerabilityError> {
        let trimmed = label.trim();
        let mapped = severity_map
            .iter()
            .find(|(raw, _)| raw.trim().eq_ignore_ascii_case(trimmed))
            .map(|(_, canonical)| canonical.as_str())
            .unwrap_or(trimmed);

        Severity::parse(mapped).ok_or_else(|| VulnerabilityError::InvalidSeverity {
            value: label.trim().to_string(),
        })
    }

    /// Derive a severity map for a template from the distinct labels in a
    /// sample CSV's severity column.
    pub fn derive_severity_map(&self, labels: &[String]) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for label in labels {
            let trimmed = label.trim();
            if trimmed.is_empty() {
                continue;
            }
            map.entry(trimmed.to_string())
                .or_insert_with(|| self.classify_severity(trimmed).as_str().to_string());
        }
        map
    }

    /// Summarize an auto-detection run over the given headers
    pub fn analyze(&self, headers: &[String], mapping: &ColumnMapping) -> MappingAnalysis {
        let mapped_columns = mapping.to_template_mapping();
        let unmapped_columns = headers
            .iter()
            .filter(|h| !mapped_columns.contains_key(*h))
            .cloned()
            .collect();
        MappingAnalysis {
            csv_columns: headers.to_vec(),
            mapped_columns,
            unmapped_columns,
        }
    }
}
