//! Account reconciliation.
//!
//! A provider may discover the same logical account through several
//! credential channels (an auth token, the OS keychain, IDE config files, a
//! browser session). Each channel produces an [`AccountCandidate`]. This
//! module collapses duplicates by [`SourcePriority`] and computes the
//! worst-case summary usage across the survivors.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::models::{AccountResult, ProviderResult, Usage, UsageDetails};

// ============================================================================
// Source Priority
// ============================================================================

/// The credential channel a candidate came from.
///
/// Channels are ranked by [`SourcePriority::rank`]; a higher rank wins when
/// two candidates describe the same account. The browser session ranks with
/// the primary token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePriority {
    /// Primary auth token (environment or CLI login).
    PrimaryToken,
    /// Validated browser session cookies.
    BrowserSession,
    /// Native OS keychain entry.
    NativeKeychain,
    /// IDE-managed config file.
    IdeConfig,
    /// Any other config file.
    OtherConfig,
}

impl SourcePriority {
    /// Numeric rank, higher is more trusted.
    pub fn rank(self) -> u8 {
        match self {
            Self::PrimaryToken | Self::BrowserSession => 3,
            Self::NativeKeychain => 2,
            Self::IdeConfig => 1,
            Self::OtherConfig => 0,
        }
    }

    /// Channel name used in logs, details and error messages.
    pub fn channel_name(self) -> &'static str {
        match self {
            Self::PrimaryToken => "primary_token",
            Self::BrowserSession => "browser_session",
            Self::NativeKeychain => "native_keychain",
            Self::IdeConfig => "ide_config",
            Self::OtherConfig => "other_config",
        }
    }

    /// Returns whichever of the two ranks higher, preferring `self` on a tie.
    #[must_use]
    pub fn max_rank(self, other: Self) -> Self {
        if other.rank() > self.rank() { other } else { self }
    }
}

// ============================================================================
// Account Candidate
// ============================================================================

/// A provisional account record produced by one credential channel.
///
/// Candidates live for a single fetch cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountCandidate {
    /// Account login, if the channel could determine it.
    pub account_id: Option<String>,
    /// Usage reported through this channel.
    pub usage: Usage,
    /// Metadata reported through this channel.
    pub details: UsageDetails,
    /// Channel rank.
    pub source_priority: SourcePriority,
}

impl AccountCandidate {
    /// Creates a candidate with empty details.
    pub fn new(usage: Usage, source_priority: SourcePriority) -> Self {
        Self {
            account_id: None,
            usage,
            details: UsageDetails::default(),
            source_priority,
        }
    }

    /// Sets the account id.
    #[must_use]
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Sets the details.
    #[must_use]
    pub fn with_details(mut self, details: UsageDetails) -> Self {
        self.details = details;
        self
    }

    /// Returns true when this candidate's id matches `login` ignoring case.
    pub fn matches_login(&self, login: &str) -> bool {
        self.account_id
            .as_deref()
            .is_some_and(|id| id.eq_ignore_ascii_case(login))
    }

    fn reset_second(&self) -> Option<i64> {
        let from_usage = match &self.usage {
            Usage::PayAsYouGo { resets_at, .. } => *resets_at,
            Usage::QuotaBased { .. } => None,
        };
        from_usage
            .or(self.details.resets_at)
            .map(|t: DateTime<Utc>| t.timestamp())
    }

    /// Returns true if `self` and `other` describe the same logical account.
    ///
    /// Ids are compared ignoring case. Two id-less candidates are the same
    /// account when used, limit and reset (to the second) all agree.
    pub fn same_account(&self, other: &Self) -> bool {
        match (&self.account_id, &other.account_id) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => {
                let numbers_match = match (&self.usage, &other.usage) {
                    (
                        Usage::QuotaBased { .. },
                        Usage::QuotaBased { .. },
                    ) => {
                        self.usage.used() == other.usage.used()
                            && self.usage.entitlement() == other.usage.entitlement()
                    }
                    (
                        Usage::PayAsYouGo {
                            utilization: ua,
                            cost: ca,
                            ..
                        },
                        Usage::PayAsYouGo {
                            utilization: ub,
                            cost: cb,
                            ..
                        },
                    ) => {
                        ua.to_bits() == ub.to_bits()
                            && ca.map(f64::to_bits) == cb.map(f64::to_bits)
                    }
                    _ => false,
                };
                numbers_match && self.reset_second() == other.reset_second()
            }
            _ => false,
        }
    }
}

// ============================================================================
// Dedup + Aggregate
// ============================================================================

/// Removes duplicate accounts, keeping the higher-priority candidate.
///
/// The result is ordered by descending priority; among equal priorities the
/// input order is kept, so the earlier candidate wins a tie. Applying
/// `dedup` to its own output returns it unchanged.
pub fn dedup(mut candidates: Vec<AccountCandidate>) -> Vec<AccountCandidate> {
    candidates.sort_by_key(|c| Reverse(c.source_priority.rank()));

    let mut kept: Vec<AccountCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if let Some(existing) = kept.iter().find(|k| k.same_account(&candidate)) {
            debug!(
                kept = ?existing.account_id,
                kept_channel = existing.source_priority.channel_name(),
                dropped_channel = candidate.source_priority.channel_name(),
                "Dropping duplicate account candidate"
            );
            continue;
        }
        kept.push(candidate);
    }
    kept
}

fn most_constrained(candidates: &[AccountCandidate]) -> Option<&AccountCandidate> {
    candidates
        .iter()
        .filter_map(|c| c.usage.remaining().map(|r| (r, c)))
        .fold(None, |best: Option<(i64, &AccountCandidate)>, (r, c)| match best {
            Some((best_r, _)) if best_r <= r => best,
            _ => Some((r, c)),
        })
        .map(|(_, c)| c)
}

/// Worst-case usage across candidates.
///
/// Picks the quota-based candidate with the least remaining (first one on a
/// tie). Falls back to `QuotaBased { 0, 0, false }` when no candidate is
/// quota-based.
pub fn aggregate_usage(candidates: &[AccountCandidate]) -> Usage {
    most_constrained(candidates).map_or_else(Usage::empty_quota, |c| c.usage.clone())
}

/// Reconciles every candidate gathered for one provider.
///
/// # Errors
///
/// Returns [`ProviderError::AuthenticationFailed`] naming `attempted_channels`
/// when `candidates` is empty.
pub fn reconcile(
    candidates: Vec<AccountCandidate>,
    attempted_channels: &[&str],
) -> Result<ProviderResult, ProviderError> {
    if candidates.is_empty() {
        return Err(ProviderError::AuthenticationFailed(format!(
            "no usable credentials (tried: {})",
            attempted_channels.join(", ")
        )));
    }

    let deduped = dedup(candidates);

    let (usage, details) = if deduped.len() == 1 {
        (deduped[0].usage.clone(), deduped[0].details.clone())
    } else {
        let driver = most_constrained(&deduped).unwrap_or(&deduped[0]);
        (aggregate_usage(&deduped), driver.details.clone())
    };

    let accounts = deduped
        .into_iter()
        .enumerate()
        .map(|(index, c)| AccountResult {
            index,
            account_id: c.account_id,
            usage: c.usage,
            details: Some(c.details),
        })
        .collect::<Vec<_>>();

    debug!(accounts = accounts.len(), "Reconciled account candidates");

    Ok(ProviderResult {
        usage,
        details: Some(details),
        accounts,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quota(id: Option<&str>, remaining: i64, priority: SourcePriority) -> AccountCandidate {
        let c = AccountCandidate::new(Usage::quota(remaining, 300, false), priority);
        match id {
            Some(id) => c.with_account_id(id),
            None => c,
        }
    }

    #[test]
    fn test_priority_ranks() {
        assert_eq!(SourcePriority::PrimaryToken.rank(), 3);
        assert_eq!(SourcePriority::BrowserSession.rank(), 3);
        assert_eq!(SourcePriority::NativeKeychain.rank(), 2);
        assert_eq!(SourcePriority::IdeConfig.rank(), 1);
        assert_eq!(SourcePriority::OtherConfig.rank(), 0);
        assert_eq!(
            SourcePriority::PrimaryToken.max_rank(SourcePriority::BrowserSession),
            SourcePriority::PrimaryToken
        );
        assert_eq!(
            SourcePriority::IdeConfig.max_rank(SourcePriority::BrowserSession),
            SourcePriority::BrowserSession
        );
    }

    #[test]
    fn test_dedup_keeps_higher_priority() {
        let mut low = quota(Some("Alice"), 10, SourcePriority::IdeConfig);
        low.details.plan = Some("free".into());
        let mut high = quota(Some("alice"), 20, SourcePriority::NativeKeychain);
        high.details.plan = Some("business".into());
        high.details.channel = Some("native_keychain".into());
        let high_details = high.details.clone();

        let out = dedup(vec![low.clone(), high.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_priority, SourcePriority::NativeKeychain);
        assert_eq!(out[0].usage.remaining(), Some(20));
        assert_eq!(out[0].details, high_details);

        let result = reconcile(vec![low, high], &[]).unwrap();
        assert_eq!(result.usage.remaining(), Some(20));
        assert_eq!(result.details.as_ref(), Some(&high_details));
        assert_eq!(result.accounts[0].details.as_ref(), Some(&high_details));
    }

    #[test]
    fn test_dedup_equal_priority_keeps_earlier() {
        let first = quota(Some("bob"), 1, SourcePriority::IdeConfig);
        let second = quota(Some("BOB"), 2, SourcePriority::IdeConfig);

        let out = dedup(vec![first, second]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].usage.remaining(), Some(1));
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let input = vec![
            quota(Some("a"), 5, SourcePriority::OtherConfig),
            quota(None, 7, SourcePriority::IdeConfig),
            quota(Some("A"), 9, SourcePriority::PrimaryToken),
            quota(None, 7, SourcePriority::NativeKeychain),
            quota(Some("b"), 3, SourcePriority::IdeConfig),
        ];
        let once = dedup(input);
        let twice = dedup(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_dedup_idless_compares_numbers_and_reset_second() {
        let reset = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
        let details_a = UsageDetails {
            resets_at: Some(reset + chrono::Duration::milliseconds(200)),
            ..Default::default()
        };
        let details_b = UsageDetails {
            resets_at: Some(reset + chrono::Duration::milliseconds(900)),
            ..Default::default()
        };
        let a = quota(None, 50, SourcePriority::IdeConfig).with_details(details_a);
        let b = quota(None, 50, SourcePriority::OtherConfig).with_details(details_b);
        assert!(a.same_account(&b));

        let c = quota(None, 51, SourcePriority::OtherConfig);
        assert!(!a.same_account(&c));
    }

    #[test]
    fn test_id_and_idless_are_distinct() {
        let a = quota(Some("alice"), 50, SourcePriority::IdeConfig);
        let b = quota(None, 50, SourcePriority::IdeConfig);
        assert!(!a.same_account(&b));
        assert_eq!(dedup(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_aggregate_picks_minimum_remaining() {
        let candidates = vec![
            quota(Some("a"), 50, SourcePriority::PrimaryToken),
            quota(Some("b"), 10, SourcePriority::PrimaryToken),
            quota(Some("c"), 80, SourcePriority::PrimaryToken),
        ];
        assert_eq!(aggregate_usage(&candidates).remaining(), Some(10));
    }

    #[test]
    fn test_aggregate_neutral_without_quota() {
        let payg = AccountCandidate::new(
            Usage::PayAsYouGo {
                utilization: 0.5,
                cost: Some(2.0),
                resets_at: None,
            },
            SourcePriority::PrimaryToken,
        );
        assert_eq!(aggregate_usage(&[payg]), Usage::empty_quota());
        assert_eq!(aggregate_usage(&[]), Usage::empty_quota());
    }

    #[test]
    fn test_reconcile_empty_names_channels() {
        let err = reconcile(Vec::new(), &["primary_token", "browser_session"]).unwrap_err();
        match err {
            ProviderError::AuthenticationFailed(msg) => {
                assert!(msg.contains("primary_token"));
                assert!(msg.contains("browser_session"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reconcile_multi_account_uses_aggregate() {
        let mut low = quota(Some("low"), 4, SourcePriority::IdeConfig);
        low.details.plan = Some("business".into());
        let candidates = vec![quota(Some("high"), 200, SourcePriority::PrimaryToken), low];

        let result = reconcile(candidates, &[]).unwrap();
        assert_eq!(result.accounts.len(), 2);
        assert_eq!(result.usage.remaining(), Some(4));
        assert_eq!(
            result.details.as_ref().and_then(|d| d.plan.as_deref()),
            Some("business")
        );
        // sorted by priority, indexed positionally
        assert_eq!(result.accounts[0].account_id.as_deref(), Some("high"));
        assert_eq!(result.accounts[1].index, 1);
    }

    #[test]
    fn test_reconcile_reports_minimum_and_keeps_every_account() {
        let candidates = vec![
            quota(Some("a"), 50, SourcePriority::PrimaryToken),
            quota(Some("b"), 10, SourcePriority::PrimaryToken),
            quota(Some("c"), 80, SourcePriority::PrimaryToken),
        ];

        let result = reconcile(candidates.clone(), &[]).unwrap();
        assert_eq!(result.usage.remaining(), Some(10));
        assert_eq!(result.accounts.len(), 3);
        for (account, input) in result.accounts.iter().zip(&candidates) {
            assert_eq!(account.account_id, input.account_id);
            assert_eq!(account.usage, input.usage);
            assert_eq!(account.details.as_ref(), Some(&input.details));
        }
    }

    #[test]
    fn test_reconcile_single_account_uses_its_usage() {
        let payg = AccountCandidate::new(
            Usage::PayAsYouGo {
                utilization: 0.1,
                cost: None,
                resets_at: None,
            },
            SourcePriority::NativeKeychain,
        );
        let result = reconcile(vec![payg.clone()], &[]).unwrap();
        assert_eq!(result.usage, payg.usage);
        assert_eq!(result.accounts.len(), 1);
    }
}
