//! Delimited tabular text reading
//!
//! Scanner exports arrive as CSV bytes with a header row. This module parses
//! them into an in-memory document the column mapper can work over; uploads
//! are bounded (human-generated exports), so no streaming is needed.

use crate::domain::vulnerability::errors::VulnerabilityError;

/// A parsed CSV upload: header row plus data rows
#[derive(Debug, Clone)]
pub struct CsvDocument {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvDocument {
    /// Parse CSV bytes with a header row.
    ///
    /// Fields are whitespace-trimmed. Short rows are padded by the flexible
    /// reader; a row that cannot be decoded at all fails the whole parse,
    /// since nothing has been persisted yet.
    pub fn parse(bytes: &[u8]) -> Result<Self, VulnerabilityError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| VulnerabilityError::MalformedCsv {
                reason: e.to_string(),
            })?
            .iter()
            .map(|h| h.to_string())
            .collect();

        if headers.is_empty() {
            return Err(VulnerabilityError::MalformedCsv {
                reason: "missing header row".to_string(),
            });
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| VulnerabilityError::MalformedCsv {
                reason: e.to_string(),
            })?;
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Field value at `column` in `row`, or `""` for short rows
    pub fn field<'a>(&'a self, row: &'a [String], column: usize) -> &'a str {
        row.get(column).map(String::as_str).unwrap_or("")
    }
}
