//! Serde shape tests for core types.
//!
//! The snapshot map is handed to the presentation layer as JSON, so the
//! field and tag names here are part of the external contract.

use chrono::{TimeZone, Utc};
use serde_json::json;

use crate::{AccountResult, ProviderKind, ProviderResult, QuotaRecord, Usage, UsageDetails};

// ============================================================================
// ProviderKind
// ============================================================================

#[test]
fn test_provider_kind_serializes_lowercase() {
    assert_eq!(serde_json::to_value(ProviderKind::Copilot).unwrap(), json!("copilot"));
    assert_eq!(
        serde_json::to_value(ProviderKind::Antigravity).unwrap(),
        json!("antigravity")
    );
    let bad: Result<ProviderKind, _> = serde_json::from_str(r#""invalid_provider""#);
    assert!(bad.is_err());
}

// ============================================================================
// Usage
// ============================================================================

#[test]
fn test_usage_is_tagged_by_kind() {
    let value = serde_json::to_value(Usage::quota(-3, 300, true)).unwrap();
    assert_eq!(
        value,
        json!({
            "kind": "quota_based",
            "remaining": -3,
            "entitlement": 300,
            "overage_permitted": true
        })
    );

    let payg: Usage = serde_json::from_value(json!({
        "kind": "pay_as_you_go",
        "utilization": 0.2,
        "cost": 1.5,
        "resets_at": null
    }))
    .unwrap();
    assert!(!payg.is_quota());
}

// ============================================================================
// Results
// ============================================================================

#[test]
fn test_details_omit_empty_fields() {
    let value = serde_json::to_value(UsageDetails::default()).unwrap();
    assert_eq!(value, json!({}));
}

#[test]
fn test_provider_result_shape() {
    let reset = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let result = ProviderResult {
        usage: Usage::quota(90, 100, false),
        details: Some(UsageDetails {
            models: vec![QuotaRecord::new("gemini-pro", 0.9).with_reset(Some(reset))],
            ..Default::default()
        }),
        accounts: vec![AccountResult {
            index: 0,
            account_id: Some("alice".into()),
            usage: Usage::quota(90, 100, false),
            details: None,
        }],
    };

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["usage"]["remaining"], json!(90));
    assert_eq!(value["details"]["models"][0]["label"], json!("gemini-pro"));
    assert_eq!(value["accounts"][0]["account_id"], json!("alice"));
    assert!(value["accounts"][0].get("details").is_none());

    let back: ProviderResult = serde_json::from_value(value).unwrap();
    assert_eq!(back, result);
}
