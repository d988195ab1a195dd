//! Reconciled per-provider results.

use serde::{Deserialize, Serialize};

use super::usage::{Usage, UsageDetails};

/// The reconciled record for one provider.
///
/// When `accounts` holds two or more entries, `usage` is the worst-case
/// aggregate over them (see [`crate::reconcile::aggregate_usage`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    /// Summary usage for the provider.
    pub usage: Usage,
    /// Metadata for the summary usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<UsageDetails>,
    /// Every distinct account, highest source priority first.
    #[serde(default)]
    pub accounts: Vec<AccountResult>,
}

impl ProviderResult {
    /// Creates a single-account result with no per-account breakdown.
    pub fn single(usage: Usage, details: Option<UsageDetails>) -> Self {
        Self {
            usage,
            details,
            accounts: Vec::new(),
        }
    }

    /// Returns true when the result carries a per-account breakdown.
    pub fn has_multiple_accounts(&self) -> bool {
        self.accounts.len() >= 2
    }
}

/// One distinct account inside a provider result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResult {
    /// Position in the account list.
    pub index: usize,
    /// Best-effort account identifier (login).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Usage for this account.
    pub usage: Usage,
    /// Metadata for this account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<UsageDetails>,
}

impl AccountResult {
    /// Label for display: the account id, or the position when it is unknown.
    pub fn label(&self) -> String {
        match &self.account_id {
            Some(id) => id.clone(),
            None => format!("#{}", self.index + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_falls_back_to_position() {
        let account = AccountResult {
            index: 1,
            account_id: None,
            usage: Usage::empty_quota(),
            details: None,
        };
        assert_eq!(account.label(), "#2");

        let named = AccountResult {
            account_id: Some("alice".into()),
            ..account
        };
        assert_eq!(named.label(), "alice");
    }

    #[test]
    fn test_single_has_no_accounts() {
        let result = ProviderResult::single(Usage::quota(1, 2, false), None);
        assert!(result.accounts.is_empty());
        assert!(!result.has_multiple_accounts());
    }
}
