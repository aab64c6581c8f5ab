//! Row normalization
//!
//! Applies a resolved column mapping to a CSV document and produces canonical
//! rows, collecting per-row failures instead of aborting the batch.

use std::collections::BTreeMap;

use crate::domain::vulnerability::value_objects::{CanonicalField, NormalizedRow, normalize_cves};
use crate::infrastructure::csv::CsvDocument;
use crate::infrastructure::mapping::{ColumnMapper, ColumnMapping};

/// Result of normalizing one document
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub rows: Vec<NormalizedRow>,
    /// Rows dropped for missing required fields (or severity, in strict mode)
    pub skipped: usize,
    /// Strict-mode validation errors; a non-empty list rejects the batch
    pub errors: Vec<String>,
    /// Non-fatal oddities (unparseable CVSS scores, defaulted severities)
    pub warnings: Vec<String>,
}

/// Normalize every row of `doc` through `mapping`.
///
/// A row missing a required canonical field is skipped and counted, not a
/// fatal abort. In strict mode a severity outside the canonical set is an
/// error naming the offending value; in permissive mode it degrades to the
/// pattern classifier's default.
pub fn normalize_rows(
    doc: &CsvDocument,
    mapping: &ColumnMapping,
    severity_map: &BTreeMap<String, String>,
    mapper: &ColumnMapper,
    strict: bool,
) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();

    let ip_col = mapping.get(CanonicalField::Ip).map(|c| c.index);
    let hostname_col = mapping.get(CanonicalField::Hostname).map(|c| c.index);
    let name_col = mapping.get(CanonicalField::NvtName).map(|c| c.index);
    let severity_col = mapping.get(CanonicalField::Severity).map(|c| c.index);
    let cvss_col = mapping.get(CanonicalField::Cvss).map(|c| c.index);
    let cves_col = mapping.get(CanonicalField::Cves).map(|c| c.index);

    for (row_number, row) in doc.rows().iter().enumerate() {
        let field = |col: Option<usize>| col.map(|c| doc.field(row, c)).unwrap_or("");

        let ip = field(ip_col).trim();
        let nvt_name = field(name_col).trim();
        if ip.is_empty() || nvt_name.is_empty() {
            outcome.skipped += 1;
            continue;
        }

        // No mapped severity column means every row takes the classifier
        // default; strict validation only judges labels the file carries.
        let severity_label = field(severity_col);
        let severity = if severity_col.is_none() {
            mapper.classify_severity(severity_label)
        } else {
            match mapper.map_severity(severity_label, severity_map) {
                Ok(severity) => severity,
                Err(err) if strict => {
                    outcome
                        .errors
                        .push(format!("row {}: {}", row_number + 1, err));
                    outcome.skipped += 1;
                    continue;
                }
                Err(_) => mapper.classify_severity(severity_label),
            }
        };

        let cvss_raw = field(cvss_col).trim();
        let cvss = if cvss_raw.is_empty() {
            None
        } else {
            match cvss_raw.parse::<f64>() {
                Ok(score) => Some(score),
                Err(_) => {
                    outcome.warnings.push(format!(
                        "row {}: unparseable CVSS score '{}', stored as empty",
                        row_number + 1,
                        cvss_raw
                    ));
                    None
                }
            }
        };

        outcome.rows.push(NormalizedRow {
            ip: ip.to_string(),
            hostname: field(hostname_col).trim().to_string(),
            nvt_name: nvt_name.to_string(),
            severity,
            cvss,
            cves: normalize_cves(field(cves_col)),
        });
    }

    outcome
}
