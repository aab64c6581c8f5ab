//! Manual override and change history tests
//!
//! Overrides pin a record against future reconciliation, capture the original
//! value exactly once, and leave an audit trail entry per applied change.

use std::sync::Arc;

use hakon_core::application::overrides::{
    ChangeHistoryQuery, ManualOverrideUseCase, OverrideTarget, ResetOverrideUseCase,
};
use hakon_core::domain::vulnerability::entities::VulnerabilityRecord;
use hakon_core::domain::vulnerability::errors::VulnerabilityError;
use hakon_core::domain::vulnerability::repositories::IVulnerabilityRepository;
use hakon_core::domain::vulnerability::value_objects::{
    ChangedField, MonthLabel, NormalizedRow, Severity, VulnStatus, normalize_cves,
};
use hakon_core::infrastructure::repositories::{
    InMemoryChangeHistoryRepository, InMemoryVulnerabilityRepository,
};

struct Fixture {
    vulnerabilities: Arc<InMemoryVulnerabilityRepository>,
    override_uc: ManualOverrideUseCase,
    reset_uc: ResetOverrideUseCase,
    query: ChangeHistoryQuery,
}

fn fixture() -> Fixture {
    let vulnerabilities = Arc::new(InMemoryVulnerabilityRepository::new());
    let history = Arc::new(InMemoryChangeHistoryRepository::new());
    let override_uc = ManualOverrideUseCase::new(vulnerabilities.clone(), history.clone());
    let reset_uc = ResetOverrideUseCase::new(vulnerabilities.clone(), history.clone());
    let query = ChangeHistoryQuery::new(history);
    Fixture {
        vulnerabilities,
        override_uc,
        reset_uc,
        query,
    }
}

fn record(month: &str) -> VulnerabilityRecord {
    let row = NormalizedRow {
        ip: "10.0.0.1".to_string(),
        hostname: "web1".to_string(),
        nvt_name: "SQL Injection".to_string(),
        severity: Severity::High,
        cvss: Some(8.1),
        cves: normalize_cves("CVE-2024-0001"),
    };
    VulnerabilityRecord::from_row(
        row,
        MonthLabel::parse(month).unwrap(),
        VulnStatus::New,
        "tester",
    )
}

async fn seed(fx: &Fixture, month: &str) -> VulnerabilityRecord {
    let record = record(month);
    fx.vulnerabilities
        .commit_snapshot(std::slice::from_ref(&record), &[])
        .await
        .unwrap();
    record
}

#[tokio::test]
async fn test_severity_override_persists_and_records_history() {
    let fx = fixture();
    let seeded = seed(&fx, "2025-06").await;

    let result = fx
        .override_uc
        .execute(
            OverrideTarget::Id(seeded.id),
            ChangedField::Severity,
            "Critical",
            "analyst",
            Some("exploit observed in the wild".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(result.record.severity, Severity::Critical);
    assert_eq!(result.record.original_severity, Severity::High);
    assert!(result.record.severity_manually_changed);
    assert_eq!(result.change.old_value, "High");
    assert_eq!(result.change.new_value, "Critical");

    let stored = fx
        .vulnerabilities
        .find_by_id(&seeded.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.severity, Severity::Critical);

    let entries = fx.query.for_record(&seeded.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].changed_by, "analyst");
    assert_eq!(
        entries[0].reason.as_deref(),
        Some("exploit observed in the wild")
    );
}

#[tokio::test]
async fn test_second_override_keeps_first_original() {
    let fx = fixture();
    let seeded = seed(&fx, "2025-06").await;

    fx.override_uc
        .execute(
            OverrideTarget::Id(seeded.id),
            ChangedField::Severity,
            "Critical",
            "analyst",
            None,
        )
        .await
        .unwrap();
    fx.override_uc
        .execute(
            OverrideTarget::Id(seeded.id),
            ChangedField::Severity,
            "Low",
            "analyst",
            None,
        )
        .await
        .unwrap();

    let stored = fx
        .vulnerabilities
        .find_by_id(&seeded.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.severity, Severity::Low);
    assert_eq!(stored.original_severity, Severity::High);

    // One history entry per applied change
    let entries = fx.query.for_record(&seeded.id).await.unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_override_by_hash_targets_latest_record() {
    let fx = fixture();
    let old = seed(&fx, "2025-05").await;
    let latest = seed(&fx, "2025-06").await;
    assert_eq!(old.vuln_hash, latest.vuln_hash);

    let result = fx
        .override_uc
        .execute(
            OverrideTarget::Hash(latest.vuln_hash.clone()),
            ChangedField::Status,
            "closed",
            "analyst",
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.record.id, latest.id);

    let untouched = fx
        .vulnerabilities
        .find_by_id(&old.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, VulnStatus::New);
}

#[tokio::test]
async fn test_invalid_override_values_rejected() {
    let fx = fixture();
    let seeded = seed(&fx, "2025-06").await;

    let err = fx
        .override_uc
        .execute(
            OverrideTarget::Id(seeded.id),
            ChangedField::Severity,
            "Sev 4",
            "analyst",
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VulnerabilityError::InvalidSeverity { .. }));

    let err = fx
        .override_uc
        .execute(
            OverrideTarget::Id(seeded.id),
            ChangedField::Status,
            "resolved",
            "analyst",
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VulnerabilityError::InvalidStatus { .. }));

    // No history entries for rejected changes
    assert!(fx.query.for_record(&seeded.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_override_unknown_target_not_found() {
    let fx = fixture();

    let err = fx
        .override_uc
        .execute(
            OverrideTarget::Id(uuid::Uuid::new_v4()),
            ChangedField::Severity,
            "Low",
            "analyst",
            None,
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = fx
        .override_uc
        .execute(
            OverrideTarget::Hash("deadbeef".repeat(8)),
            ChangedField::Severity,
            "Low",
            "analyst",
            None,
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_reset_restores_original_and_clears_flag() {
    let fx = fixture();
    let seeded = seed(&fx, "2025-06").await;

    fx.override_uc
        .execute(
            OverrideTarget::Id(seeded.id),
            ChangedField::Severity,
            "Critical",
            "analyst",
            None,
        )
        .await
        .unwrap();

    let result = fx
        .reset_uc
        .execute(
            OverrideTarget::Id(seeded.id),
            ChangedField::Severity,
            "analyst",
            Some("false alarm".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(result.record.severity, Severity::High);
    assert!(!result.record.severity_manually_changed);

    // Override plus reset: two history entries
    let entries = fx.query.for_record(&seeded.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].new_value, "High");
}

#[tokio::test]
async fn test_reset_without_override_is_rejected() {
    let fx = fixture();
    let seeded = seed(&fx, "2025-06").await;

    let err = fx
        .reset_uc
        .execute(
            OverrideTarget::Id(seeded.id),
            ChangedField::Status,
            "analyst",
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, VulnerabilityError::NotManuallyChanged { .. }));
}

#[tokio::test]
async fn test_list_all_history_most_recent_first() {
    let fx = fixture();
    let first = seed(&fx, "2025-05").await;

    fx.override_uc
        .execute(
            OverrideTarget::Id(first.id),
            ChangedField::Severity,
            "Low",
            "analyst",
            None,
        )
        .await
        .unwrap();
    fx.override_uc
        .execute(
            OverrideTarget::Id(first.id),
            ChangedField::Status,
            "closed",
            "analyst",
            None,
        )
        .await
        .unwrap();

    let all = fx.query.list_all(0, 10).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].changed_at >= all[1].changed_at);
    assert_eq!(all[0].field, ChangedField::Status);

    let page = fx.query.list_all(1, 10).await.unwrap();
    assert_eq!(page.len(), 1);
}
