//! End-to-end ingestion tests over the in-memory repositories
//!
//! Exercises the monthly reconciliation lifecycle: first-seen findings are
//! new, carried-over findings are ongoing, findings that disappear are closed,
//! and findings that come back after a closure are reopened.

use std::collections::BTreeMap;
use std::sync::Arc;

use hakon_core::application::ingestion::{
    ImportSummary, TemplateSelector, UploadScanUseCase, ValidateTemplateUseCase,
};
use hakon_core::application::overrides::{ManualOverrideUseCase, OverrideTarget};
use hakon_core::config::IngestionConfig;
use hakon_core::domain::vulnerability::entities::ScanTemplate;
use hakon_core::domain::vulnerability::errors::VulnerabilityError;
use hakon_core::domain::vulnerability::repositories::{
    ITemplateRepository, IVulnerabilityRepository,
};
use hakon_core::domain::vulnerability::value_objects::{
    ChangedField, MonthLabel, Severity, VulnStatus,
};
use hakon_core::infrastructure::mapping::ColumnMapper;
use hakon_core::infrastructure::repositories::{
    InMemoryChangeHistoryRepository, InMemoryTemplateRepository, InMemoryVulnerabilityRepository,
};

struct Fixture {
    vulnerabilities: Arc<InMemoryVulnerabilityRepository>,
    templates: Arc<InMemoryTemplateRepository>,
    upload: UploadScanUseCase,
}

fn fixture_with_config(config: IngestionConfig) -> Fixture {
    let vulnerabilities = Arc::new(InMemoryVulnerabilityRepository::new());
    let templates = Arc::new(InMemoryTemplateRepository::new());
    let upload = UploadScanUseCase::new(
        vulnerabilities.clone(),
        templates.clone(),
        ColumnMapper::default(),
        config,
    );
    Fixture {
        vulnerabilities,
        templates,
        upload,
    }
}

fn fixture() -> Fixture {
    fixture_with_config(IngestionConfig::default())
}

const HEADER: &str = "IP,Hostname,NVT Name,Severity,CVSS,CVEs";

fn csv(rows: &[&str]) -> Vec<u8> {
    let mut out = String::from(HEADER);
    for row in rows {
        out.push('\n');
        out.push_str(row);
    }
    out.into_bytes()
}

async fn upload(fx: &Fixture, month: &str, rows: &[&str]) -> ImportSummary {
    fx.upload
        .execute(&csv(rows), TemplateSelector::AutoDetect, month, "tester")
        .await
        .unwrap()
}

#[tokio::test]
async fn test_first_upload_is_all_new() {
    let fx = fixture();

    let summary = upload(
        &fx,
        "2025-06",
        &[
            "10.0.0.1,web1,SQL Injection,High,8.1,CVE-2024-0001",
            "10.0.0.2,web2,Outdated TLS,Medium,5.3,",
        ],
    )
    .await;

    assert_eq!(summary.total_rows, 2);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.new, 2);
    assert_eq!(summary.ongoing, 0);
    assert_eq!(summary.reopened, 0);
    assert_eq!(summary.closed, 0);
    assert_eq!(fx.vulnerabilities.len().await, 2);
}

#[tokio::test]
async fn test_carried_over_finding_is_ongoing_and_missing_is_closed() {
    let fx = fixture();

    upload(
        &fx,
        "2025-06",
        &[
            "10.0.0.1,web1,SQL Injection,High,8.1,CVE-2024-0001",
            "10.0.0.2,web2,Outdated TLS,Medium,5.3,",
        ],
    )
    .await;

    // July re-reports only the SQL injection
    let summary = upload(
        &fx,
        "2025-07",
        &["10.0.0.1,web1,SQL Injection,High,8.1,CVE-2024-0001"],
    )
    .await;

    assert_eq!(summary.new, 0);
    assert_eq!(summary.ongoing, 1);
    assert_eq!(summary.closed, 1);

    // June's TLS record is now closed; June's SQLi record is untouched
    let june = MonthLabel::parse("2025-06").unwrap();
    let open_june = fx.vulnerabilities.find_open_by_month(&june).await.unwrap();
    assert_eq!(open_june.len(), 1);
    assert_eq!(open_june[0].nvt_name, "SQL Injection");
}

#[tokio::test]
async fn test_finding_returning_after_closure_is_reopened() {
    let fx = fixture();

    upload(&fx, "2025-06", &["10.0.0.1,web1,SQL Injection,High,8.1,"]).await;
    // July omits it: closed
    upload(&fx, "2025-07", &["10.0.0.2,web2,Other,Low,2.0,"]).await;
    // August reports it again
    let summary = upload(&fx, "2025-08", &["10.0.0.1,web1,SQL Injection,High,8.1,"]).await;

    assert_eq!(summary.reopened, 1);
    assert_eq!(summary.new, 0);
}

#[tokio::test]
async fn test_gap_month_still_counts_as_ongoing() {
    let fx = fixture();

    upload(&fx, "2025-03", &["10.0.0.1,web1,SQL Injection,High,8.1,"]).await;
    // Nothing uploaded for April or May; June sees the same finding. The
    // March record was never closed, so the finding is ongoing, not new.
    let summary = upload(&fx, "2025-06", &["10.0.0.1,web1,SQL Injection,High,8.1,"]).await;

    assert_eq!(summary.ongoing, 1);
    assert_eq!(summary.new, 0);
}

#[tokio::test]
async fn test_duplicate_hashes_collapse_last_row_wins() {
    let fx = fixture();

    let summary = upload(
        &fx,
        "2025-06",
        &[
            "10.0.0.1,web1,SQL Injection,Low,3.0,CVE-2024-0001",
            "10.0.0.1,web1,SQL Injection,High,8.1,CVE-2024-0001",
        ],
    )
    .await;

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.duplicates, 1);

    let june = MonthLabel::parse("2025-06").unwrap();
    let records = fx.vulnerabilities.find_open_by_month(&june).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].severity, Severity::High);
}

#[tokio::test]
async fn test_rows_missing_required_fields_are_skipped() {
    let fx = fixture();

    let summary = upload(
        &fx,
        "2025-06",
        &[
            "10.0.0.1,web1,SQL Injection,High,8.1,",
            ",web2,No IP Here,High,8.1,",
            "10.0.0.3,web3,,High,8.1,",
        ],
    )
    .await;

    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 2);
}

#[tokio::test]
async fn test_strict_mode_rejects_non_canonical_severity() {
    let fx = fixture_with_config(IngestionConfig {
        strict: true,
        ..IngestionConfig::default()
    });

    let err = fx
        .upload
        .execute(
            &csv(&["10.0.0.1,web1,SQL Injection,Sev 4,8.1,"]),
            TemplateSelector::AutoDetect,
            "2025-06",
            "tester",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, VulnerabilityError::ValidationFailed { .. }));
    // Nothing committed on rejection
    assert!(fx.vulnerabilities.is_empty().await);
}

#[tokio::test]
async fn test_strict_upload_without_severity_mapping_defaults_to_medium() {
    let fx = fixture_with_config(IngestionConfig {
        strict: true,
        ..IngestionConfig::default()
    });

    // Template maps only the required fields; no severity column
    let mut column_mapping = BTreeMap::new();
    column_mapping.insert("Address".to_string(), "ip".to_string());
    column_mapping.insert("Finding".to_string(), "nvt_name".to_string());
    let template = ScanTemplate::new(
        "Minimal".to_string(),
        "test".to_string(),
        column_mapping,
        BTreeMap::new(),
        "tester",
    );
    fx.templates.create(&template).await.unwrap();

    let bytes = b"Address,Finding\n10.0.0.1,Weak Cipher\n10.0.0.2,Banner\n";

    // The dry run accepts the pairing with only a default-severity warning,
    // and the strict upload must agree with it
    let validate = ValidateTemplateUseCase::new(fx.templates.clone(), ColumnMapper::default());
    let report = validate.execute(bytes, &template.id).await.unwrap();
    assert!(report.valid);
    assert!(report.warnings.iter().any(|w| w.contains("Medium")));

    let summary = fx
        .upload
        .execute(
            bytes,
            TemplateSelector::Template(template.id),
            "2025-06",
            "tester",
        )
        .await
        .unwrap();
    assert_eq!(summary.inserted, 2);

    let june = MonthLabel::parse("2025-06").unwrap();
    let records = fx.vulnerabilities.find_open_by_month(&june).await.unwrap();
    assert!(records.iter().all(|r| r.severity == Severity::Medium));
}

#[tokio::test]
async fn test_row_limit_enforced() {
    let fx = fixture_with_config(IngestionConfig {
        max_rows: 1,
        ..IngestionConfig::default()
    });

    let err = fx
        .upload
        .execute(
            &csv(&[
                "10.0.0.1,web1,A,High,8.1,",
                "10.0.0.2,web2,B,High,8.1,",
            ]),
            TemplateSelector::AutoDetect,
            "2025-06",
            "tester",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, VulnerabilityError::TooManyRows { .. }));
}

#[tokio::test]
async fn test_invalid_month_label_rejected() {
    let fx = fixture();

    let err = fx
        .upload
        .execute(
            &csv(&["10.0.0.1,web1,A,High,8.1,"]),
            TemplateSelector::AutoDetect,
            "June 2025",
            "tester",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, VulnerabilityError::InvalidMonthLabel { .. }));
}

#[tokio::test]
async fn test_close_pass_skips_manually_pinned_records() {
    let fx = fixture();
    let history = Arc::new(InMemoryChangeHistoryRepository::new());
    let override_uc = ManualOverrideUseCase::new(fx.vulnerabilities.clone(), history);

    upload(
        &fx,
        "2025-06",
        &[
            "10.0.0.1,web1,Pinned Finding,High,8.1,",
            "10.0.0.2,web2,Unpinned Finding,High,8.1,",
        ],
    )
    .await;

    // Pin the first record's status by hand
    let june = MonthLabel::parse("2025-06").unwrap();
    let records = fx.vulnerabilities.find_open_by_month(&june).await.unwrap();
    let pinned = records
        .iter()
        .find(|r| r.nvt_name == "Pinned Finding")
        .unwrap();
    override_uc
        .execute(
            OverrideTarget::Id(pinned.id),
            ChangedField::Status,
            "ongoing",
            "analyst",
            Some("tracking in ticket VULN-17".to_string()),
        )
        .await
        .unwrap();

    // July reports neither finding; only the unpinned one closes
    let summary = upload(&fx, "2025-07", &["10.0.0.3,web3,Fresh,Low,2.0,"]).await;
    assert_eq!(summary.closed, 1);

    let pinned_after = fx
        .vulnerabilities
        .find_by_id(&pinned.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pinned_after.status, VulnStatus::Ongoing);
    assert!(pinned_after.status_manually_changed);
}

#[tokio::test]
async fn test_upload_through_saved_template() {
    let fx = fixture();

    // Scanner export with vendor column names and numeric severity labels
    let mut column_mapping = BTreeMap::new();
    column_mapping.insert("Asset Address".to_string(), "ip".to_string());
    column_mapping.insert("Finding".to_string(), "nvt_name".to_string());
    column_mapping.insert("Sev".to_string(), "severity".to_string());
    let mut severity_map = BTreeMap::new();
    severity_map.insert("4".to_string(), "Critical".to_string());
    severity_map.insert("1".to_string(), "Low".to_string());

    let template = ScanTemplate::new(
        "Vendor X".to_string(),
        "vendorx".to_string(),
        column_mapping,
        severity_map,
        "tester",
    );
    fx.templates.create(&template).await.unwrap();

    let bytes = b"Asset Address,Finding,Sev\n10.0.0.1,Weak Cipher,4\n10.0.0.2,Banner,1\n";
    let summary = fx
        .upload
        .execute(
            bytes,
            TemplateSelector::Template(template.id),
            "2025-06",
            "tester",
        )
        .await
        .unwrap();

    assert_eq!(summary.inserted, 2);

    let june = MonthLabel::parse("2025-06").unwrap();
    let mut records = fx.vulnerabilities.find_open_by_month(&june).await.unwrap();
    records.sort_by(|a, b| a.ip.cmp(&b.ip));
    assert_eq!(records[0].severity, Severity::Critical);
    assert_eq!(records[1].severity, Severity::Low);
}

#[tokio::test]
async fn test_missing_template_is_an_error() {
    let fx = fixture();

    let err = fx
        .upload
        .execute(
            &csv(&["10.0.0.1,web1,A,High,8.1,"]),
            TemplateSelector::Template(uuid::Uuid::new_v4()),
            "2025-06",
            "tester",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, VulnerabilityError::TemplateNotFound { .. }));
}

#[tokio::test]
async fn test_auto_detect_fails_without_required_columns() {
    let fx = fixture();

    let err = fx
        .upload
        .execute(
            b"Color,Shape\nred,circle\n",
            TemplateSelector::AutoDetect,
            "2025-06",
            "tester",
        )
        .await
        .unwrap_err();

    match err {
        VulnerabilityError::RequiredFieldsMissing { missing, available } => {
            assert!(missing.contains(&"ip".to_string()));
            assert!(missing.contains(&"nvt_name".to_string()));
            assert_eq!(available, vec!["Color".to_string(), "Shape".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_list_months_most_recent_first() {
    let fx = fixture();

    upload(&fx, "2025-06", &["10.0.0.1,web1,A,High,8.1,"]).await;
    upload(&fx, "2025-07", &["10.0.0.1,web1,A,High,8.1,"]).await;

    let months = fx.vulnerabilities.list_months().await.unwrap();
    let labels: Vec<&str> = months.iter().map(|m| m.as_str()).collect();
    assert_eq!(labels, vec!["2025-07", "2025-06"]);
}

#[tokio::test]
async fn test_validate_template_reports_without_persisting() {
    let fx = fixture();

    let mut column_mapping = BTreeMap::new();
    column_mapping.insert("IP".to_string(), "ip".to_string());
    column_mapping.insert("NVT Name".to_string(), "nvt_name".to_string());
    column_mapping.insert("Missing Column".to_string(), "severity".to_string());
    let template = ScanTemplate::new(
        "Partial".to_string(),
        "test".to_string(),
        column_mapping,
        BTreeMap::new(),
        "tester",
    );
    fx.templates.create(&template).await.unwrap();

    let validate = ValidateTemplateUseCase::new(fx.templates.clone(), ColumnMapper::default());
    let report = validate
        .execute(&csv(&["10.0.0.1,web1,A,High,8.1,"]), &template.id)
        .await
        .unwrap();

    assert!(!report.valid);
    assert!(report
        .errors
        .iter()
        .any(|e| e.contains("Missing Column")));
    assert_eq!(report.csv_info.rows, 1);
    assert!(fx.vulnerabilities.is_empty().await);
}
