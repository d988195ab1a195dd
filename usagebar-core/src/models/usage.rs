//! Usage-related types.
//!
//! This module contains the values a provider reports:
//! - [`Usage`] - Pay-as-you-go or quota-based usage
//! - [`UsageDetails`] - Identity and plan metadata next to a usage value
//! - [`QuotaRecord`] - Per-label remaining fraction (recovered from caches)
//! - [`DailyUsage`] - One day of recovered history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Usage
// ============================================================================

/// A usage value reported for an account or a whole provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Usage {
    /// Accrued cost with no fixed entitlement.
    PayAsYouGo {
        /// Fraction of any soft budget consumed (0.0 when unknown).
        utilization: f64,
        /// Accrued cost in USD.
        cost: Option<f64>,
        /// When the billing window resets, if known.
        resets_at: Option<DateTime<Utc>>,
    },
    /// Remaining units against a periodic entitlement.
    QuotaBased {
        /// Units left. Negative when the account is in overage.
        remaining: i64,
        /// Units granted per period. Never negative.
        entitlement: i64,
        /// Whether usage beyond the entitlement is billed rather than blocked.
        overage_permitted: bool,
    },
}

impl Usage {
    /// Builds a quota-based usage value, clamping the entitlement at zero.
    pub fn quota(remaining: i64, entitlement: i64, overage_permitted: bool) -> Self {
        Self::QuotaBased {
            remaining,
            entitlement: entitlement.max(0),
            overage_permitted,
        }
    }

    /// The neutral value emitted when no quota-based account exists.
    pub fn empty_quota() -> Self {
        Self::quota(0, 0, false)
    }

    /// Returns true for quota-based usage.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaBased { .. })
    }

    /// Remaining units for quota-based usage.
    pub fn remaining(&self) -> Option<i64> {
        match self {
            Self::QuotaBased { remaining, .. } => Some(*remaining),
            Self::PayAsYouGo { .. } => None,
        }
    }

    /// Entitlement for quota-based usage.
    pub fn entitlement(&self) -> Option<i64> {
        match self {
            Self::QuotaBased { entitlement, .. } => Some(*entitlement),
            Self::PayAsYouGo { .. } => None,
        }
    }

    /// Units consumed (`entitlement - remaining`) for quota-based usage.
    pub fn used(&self) -> Option<i64> {
        match self {
            Self::QuotaBased {
                remaining,
                entitlement,
                ..
            } => Some(entitlement - remaining),
            Self::PayAsYouGo { .. } => None,
        }
    }

    /// Percentage of the entitlement consumed, if meaningful.
    #[allow(clippy::cast_precision_loss)]
    pub fn used_percent(&self) -> Option<f64> {
        match self {
            Self::QuotaBased { entitlement, .. } if *entitlement > 0 => {
                let used = self.used()?;
                Some(used as f64 / *entitlement as f64 * 100.0)
            }
            Self::QuotaBased { .. } => None,
            Self::PayAsYouGo { utilization, .. } => Some(utilization * 100.0),
        }
    }
}

// ============================================================================
// Details
// ============================================================================

/// Identity and plan metadata that travels next to a usage value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageDetails {
    /// Account login or email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Plan/subscription name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    /// When the quota period resets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
    /// Credential channel that produced the usage numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Per-label quotas (e.g. per-model fractions).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<QuotaRecord>,
    /// Recovered daily history, most recent first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<DailyUsage>,
}

// ============================================================================
// Quota Records
// ============================================================================

/// A labelled quota recovered from a local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Human-readable label (e.g. a model name).
    pub label: String,
    /// Remaining fraction, clamped to `[0, 1]`.
    pub remaining_fraction: f64,
    /// When this quota resets.
    pub reset_time: Option<DateTime<Utc>>,
}

impl QuotaRecord {
    /// Creates a record, clamping the fraction into `[0, 1]`.
    pub fn new(label: impl Into<String>, remaining_fraction: f64) -> Self {
        let fraction = if remaining_fraction.is_finite() {
            remaining_fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            label: label.into(),
            remaining_fraction: fraction,
            reset_time: None,
        }
    }

    /// Sets the reset time.
    #[must_use]
    pub fn with_reset(mut self, reset_time: Option<DateTime<Utc>>) -> Self {
        self.reset_time = reset_time;
        self
    }

    /// Remaining percentage (0-100).
    pub fn remaining_percent(&self) -> f64 {
        self.remaining_fraction * 100.0
    }
}

// ============================================================================
// History
// ============================================================================

/// One day of usage history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    /// Date label as reported by the provider.
    pub date: String,
    /// Requests covered by the entitlement.
    pub included_requests: f64,
    /// Requests billed beyond the entitlement.
    pub billed_requests: f64,
    /// Gross amount, as displayed by the provider (e.g. "$1.20").
    pub gross_amount: String,
    /// Billed amount, as displayed by the provider.
    pub billed_amount: String,
    /// Per-model breakdown.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelUsage>,
}

impl DailyUsage {
    /// Total requests for the day.
    pub fn total_requests(&self) -> f64 {
        self.included_requests + self.billed_requests
    }
}

/// Per-model usage within a day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Model name.
    pub model: String,
    /// Requests covered by the entitlement.
    pub included_requests: f64,
    /// Requests billed beyond the entitlement.
    pub billed_requests: f64,
    /// Gross amount, as displayed.
    #[serde(default)]
    pub gross_amount: String,
    /// Billed cost, as displayed.
    pub cost: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_clamps_negative_entitlement() {
        let usage = Usage::quota(5, -10, false);
        assert_eq!(usage.entitlement(), Some(0));
        assert_eq!(usage.remaining(), Some(5));
    }

    #[test]
    fn test_quota_allows_negative_remaining() {
        let usage = Usage::quota(-20, 300, true);
        assert_eq!(usage.remaining(), Some(-20));
        assert_eq!(usage.used(), Some(320));
        let pct = usage.used_percent().unwrap();
        assert!((pct - 106.666).abs() < 0.01);
    }

    #[test]
    fn test_pay_as_you_go_has_no_quota_numbers() {
        let usage = Usage::PayAsYouGo {
            utilization: 0.25,
            cost: Some(4.5),
            resets_at: None,
        };
        assert!(!usage.is_quota());
        assert_eq!(usage.remaining(), None);
        assert_eq!(usage.used(), None);
        assert_eq!(usage.used_percent(), Some(25.0));
    }

    #[test]
    fn test_empty_quota_has_no_percent() {
        let usage = Usage::empty_quota();
        assert_eq!(usage.remaining(), Some(0));
        assert_eq!(usage.used_percent(), None);
    }

    #[test]
    fn test_quota_record_clamps_fraction() {
        assert_eq!(QuotaRecord::new("a", 1.7).remaining_fraction, 1.0);
        assert_eq!(QuotaRecord::new("a", -0.2).remaining_fraction, 0.0);
        assert_eq!(QuotaRecord::new("a", f64::NAN).remaining_fraction, 0.0);
        assert_eq!(QuotaRecord::new("a", 0.42).remaining_percent(), 42.0);
    }

    #[test]
    fn test_daily_usage_total() {
        let day = DailyUsage {
            date: "Jan 3".into(),
            included_requests: 12.0,
            billed_requests: 3.0,
            ..Default::default()
        };
        assert_eq!(day.total_requests(), 15.0);
    }
}
