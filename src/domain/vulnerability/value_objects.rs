//! Vulnerability value objects
//!
//! Severity and lifecycle status enums, month labels, canonical field names,
//! and the content-derived identity hash that tracks a finding across monthly
//! uploads.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::VulnerabilityError;

/// Canonical severity levels
///
/// Every stored record carries one of these five levels. Scanner-specific
/// labels are normalized onto this set by the column mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// All canonical levels, highest first
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Parse a canonical severity label, case-insensitively.
    ///
    /// Returns `None` for anything outside the canonical set; callers decide
    /// whether that is a validation error (strict mode) or falls back to the
    /// default (permissive ingestion).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Info => "Info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a finding within a monthly snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VulnStatus {
    /// Hash never seen in any prior month
    New,
    /// Hash carried over from the immediately preceding month, non-closed
    Ongoing,
    /// Hash seen before, most recently with a closed status
    Reopened,
    /// Hash absent from a later month's upload (set by the close pass)
    Closed,
}

impl VulnStatus {
    /// Parse a status label, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "new" => Some(VulnStatus::New),
            "ongoing" => Some(VulnStatus::Ongoing),
            "reopened" => Some(VulnStatus::Reopened),
            "closed" => Some(VulnStatus::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VulnStatus::New => "new",
            VulnStatus::Ongoing => "ongoing",
            VulnStatus::Reopened => "reopened",
            VulnStatus::Closed => "closed",
        }
    }

    /// A finding is open unless it has been closed
    pub fn is_open(&self) -> bool {
        !matches!(self, VulnStatus::Closed)
    }
}

impl std::fmt::Display for VulnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field targeted by a manual override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangedField {
    Severity,
    Status,
}

impl ChangedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangedField::Severity => "severity",
            ChangedField::Status => "status",
        }
    }
}

impl std::fmt::Display for ChangedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical vulnerability attributes that scanner columns map onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Ip,
    Hostname,
    NvtName,
    Severity,
    Cvss,
    Cves,
}

impl CanonicalField {
    /// All canonical fields, in the order auto-detection tests them
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Ip,
        CanonicalField::Hostname,
        CanonicalField::NvtName,
        CanonicalField::Severity,
        CanonicalField::Cvss,
        CanonicalField::Cves,
    ];

    /// Fields a usable mapping must resolve
    pub const REQUIRED: [CanonicalField; 2] = [CanonicalField::Ip, CanonicalField::NvtName];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Ip => "ip",
            CanonicalField::Hostname => "hostname",
            CanonicalField::NvtName => "nvt_name",
            CanonicalField::Severity => "severity",
            CanonicalField::Cvss => "cvss",
            CanonicalField::Cves => "cves",
        }
    }

    /// Parse a canonical field name as stored in templates
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ip" => Some(CanonicalField::Ip),
            "hostname" => Some(CanonicalField::Hostname),
            "nvt_name" => Some(CanonicalField::NvtName),
            "severity" => Some(CanonicalField::Severity),
            "cvss" => Some(CanonicalField::Cvss),
            "cves" => Some(CanonicalField::Cves),
            _ => None,
        }
    }

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Month label in `YYYY-MM` form
///
/// Zero-padded, so lexicographic order matches chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthLabel(String);

impl MonthLabel {
    /// Parse and validate a `YYYY-MM` label
    pub fn parse(value: &str) -> Result<Self, VulnerabilityError> {
        let value = value.trim();
        let invalid = || VulnerabilityError::InvalidMonthLabel {
            value: value.to_string(),
        };

        let (year, month) = value.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        // Year 0 would have no preceding month
        let year_num: u16 = year.parse().map_err(|_| invalid())?;
        if year_num == 0 {
            return Err(invalid());
        }
        let month_num: u8 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month_num) {
            return Err(invalid());
        }

        Ok(Self(value.to_string()))
    }

    /// The immediately preceding month
    pub fn prev(&self) -> Self {
        let (year, month) = self
            .0
            .split_once('-')
            .expect("validated on construction");
        let year: u16 = year.parse().expect("validated on construction");
        let month: u8 = month.parse().expect("validated on construction");

        if month == 1 {
            Self(format!("{:04}-12", year - 1))
        } else {
            Self(format!("{:04}-{:02}", year, month - 1))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MonthLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalize a raw CVE list: split on comma, trim, drop empties, sort, dedupe.
///
/// Sorting makes the identity hash insensitive to the order scanners emit
/// CVE identifiers in.
pub fn normalize_cves(raw: &str) -> Vec<String> {
    let mut cves: Vec<String> = raw
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    cves.sort();
    cves.dedup();
    cves
}

/// Compute the identity hash of a finding.
///
/// Pure function of (trimmed ip, trimmed hostname, trimmed nvt_name, sorted
/// CVE list): the four fields are joined with `|` and hashed with SHA-256,
/// rendered as lowercase hex. This is the durable identity of a finding across
/// monthly uploads.
pub fn compute_vuln_hash(ip: &str, hostname: &str, nvt_name: &str, cves: &[String]) -> String {
    let input = format!(
        "{}|{}|{}|{}",
        ip.trim(),
        hostname.trim(),
        nvt_name.trim(),
        cves.join(",")
    );
    let digest = Sha256::digest(input.as_bytes());
    format!("{:x}", digest)
}

/// One normalized finding as produced by the column mapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub ip: String,
    pub hostname: String,
    pub nvt_name: String,
    pub severity: Severity,
    pub cvss: Option<f64>,
    pub cves: Vec<String>,
}

impl NormalizedRow {
    /// Identity hash of this row
    pub fn vuln_hash(&self) -> String {
        compute_vuln_hash(&self.ip, &self.hostname, &self.nvt_name, &self.cves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse_is_case_insensitive() {
        assert_eq!(Severity::parse("critical"), Some(Severity::Critical));
        assert_eq!(Severity::parse("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::parse(" Medium "), Some(Severity::Medium));
        assert_eq!(Severity::parse("Crit"), None);
        assert_eq!(Severity::parse("unknown123"), None);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            VulnStatus::New,
            VulnStatus::Ongoing,
            VulnStatus::Reopened,
            VulnStatus::Closed,
        ] {
            assert_eq!(VulnStatus::parse(status.as_str()), Some(status));
        }
        assert!(VulnStatus::New.is_open());
        assert!(!VulnStatus::Closed.is_open());
    }

    #[test]
    fn test_month_label_validation() {
        assert!(MonthLabel::parse("2025-07").is_ok());
        assert!(MonthLabel::parse("2025-13").is_err());
        assert!(MonthLabel::parse("2025-00").is_err());
        assert!(MonthLabel::parse("2025-7").is_err());
        assert!(MonthLabel::parse("25-07").is_err());
        assert!(MonthLabel::parse("0000-01").is_err());
        assert!(MonthLabel::parse("garbage").is_err());
    }

    #[test]
    fn test_month_label_prev() {
        let july = MonthLabel::parse("2025-07").unwrap();
        assert_eq!(july.prev().as_str(), "2025-06");

        let january = MonthLabel::parse("2025-01").unwrap();
        assert_eq!(january.prev().as_str(), "2024-12");
    }

    #[test]
    fn test_month_label_ordering_is_chronological() {
        let a = MonthLabel::parse("2024-12").unwrap();
        let b = MonthLabel::parse("2025-01").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_normalize_cves_sorts_and_dedupes() {
        assert_eq!(
            normalize_cves("CVE-2021-5678, CVE-2021-1234,CVE-2021-5678, "),
            vec!["CVE-2021-1234".to_string(), "CVE-2021-5678".to_string()]
        );
        assert!(normalize_cves("").is_empty());
    }

    #[test]
    fn test_hash_insensitive_to_cve_order_and_whitespace() {
        let a = compute_vuln_hash(
            "10.1.1.1",
            "server1",
            "SQL Injection",
            &normalize_cves("CVE-2021-1234,CVE-2021-5678"),
        );
        let b = compute_vuln_hash(
            " 10.1.1.1 ",
            "server1",
            " SQL Injection",
            &normalize_cves("CVE-2021-5678, CVE-2021-1234"),
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn test_hash_differs_when_identity_fields_differ() {
        let cves = normalize_cves("CVE-2021-1234");
        let a = compute_vuln_hash("10.1.1.1", "server1", "SQL Injection", &cves);
        let b = compute_vuln_hash("10.1.1.2", "server1", "SQL Injection", &cves);
        assert_ne!(a, b);
    }
}
