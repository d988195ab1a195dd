//! Copilot token-channel API client.
//!
//! A GitHub token is exchanged for the premium-request quota snapshot at
//! `GET /copilot_internal/user`. The response shape drifts between
//! releases, so fields are read leniently through
//! [`usagebar_fetch::coerce`].

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use usagebar_core::{AccountCandidate, SourcePriority, Usage, UsageDetails};
use usagebar_fetch::{HttpClient, coerce};

use super::error::CopilotError;

// ============================================================================
// Constants
// ============================================================================

/// Copilot user endpoint.
const COPILOT_USER_ENDPOINT: &str = "/copilot_internal/user";

/// Editor identity the endpoint expects.
const EDITOR_VERSION: &str = "vscode/1.96.0";

/// Plugin identity the endpoint expects.
const EDITOR_PLUGIN_VERSION: &str = "copilot-chat/0.26.7";

/// GitHub API version header.
const GITHUB_API_VERSION: &str = "2025-04-01";

// ============================================================================
// Token Usage
// ============================================================================

/// Premium-request quota reported for one token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenUsage {
    /// GitHub login.
    pub login: Option<String>,
    /// Copilot plan name.
    pub plan: Option<String>,
    /// Premium requests granted per period.
    pub entitlement: i64,
    /// Premium requests left. Negative in overage.
    pub remaining: i64,
    /// Whether overage is billed.
    pub overage_permitted: bool,
    /// Whether the plan has no premium-request cap.
    pub unlimited: bool,
    /// When the quota resets.
    pub resets_at: Option<DateTime<Utc>>,
}

impl TokenUsage {
    /// Parses the `/copilot_internal/user` document.
    ///
    /// # Errors
    ///
    /// Returns [`CopilotError::InvalidResponse`] if the premium quota block
    /// is missing.
    pub fn from_json(doc: &Value) -> Result<Self, CopilotError> {
        let snapshots = doc
            .get("quota_snapshots")
            .or_else(|| doc.get("quotaSnapshots"))
            .ok_or_else(|| CopilotError::InvalidResponse("missing quota_snapshots".into()))?;
        let premium = snapshots
            .get("premium_interactions")
            .or_else(|| snapshots.get("premiumInteractions"))
            .ok_or_else(|| CopilotError::InvalidResponse("missing premium_interactions".into()))?;

        let unlimited = coerce::first_bool(premium, &["unlimited"]).unwrap_or(false);
        let entitlement = coerce::first_i64(premium, &["entitlement"]).unwrap_or(0);
        let remaining = coerce::first_i64(premium, &["remaining", "quota_remaining"])
            .or_else(|| {
                // Older payloads only carry the percentage.
                coerce::first_number(premium, &["percent_remaining", "percentRemaining"])
                    .map(|pct| percent_of(entitlement, pct))
            })
            .ok_or_else(|| CopilotError::InvalidResponse("missing remaining".into()))?;

        Ok(Self {
            login: coerce::first_string(doc, &["login"]),
            plan: coerce::first_string(doc, &["copilot_plan", "copilotPlan", "access_type_sku"]),
            entitlement,
            remaining,
            overage_permitted: coerce::first_bool(
                premium,
                &["overage_permitted", "overagePermitted"],
            )
            .unwrap_or(false),
            unlimited,
            resets_at: coerce::first_string(doc, &["quota_reset_date", "quotaResetDate"])
                .as_deref()
                .and_then(parse_reset_date),
        })
    }

    /// Converts to a reconciliation candidate for `priority`.
    pub fn into_candidate(self, priority: SourcePriority) -> AccountCandidate {
        let usage = if self.unlimited {
            Usage::PayAsYouGo {
                utilization: 0.0,
                cost: None,
                resets_at: self.resets_at,
            }
        } else {
            Usage::quota(self.remaining, self.entitlement, self.overage_permitted)
        };
        let details = UsageDetails {
            login: self.login.clone(),
            plan: self.plan,
            resets_at: self.resets_at,
            channel: Some(priority.channel_name().to_string()),
            ..Default::default()
        };

        let candidate = AccountCandidate::new(usage, priority).with_details(details);
        match self.login {
            Some(login) => candidate.with_account_id(login),
            None => candidate,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn percent_of(entitlement: i64, pct: f64) -> i64 {
    (entitlement as f64 * pct / 100.0).round() as i64
}

/// Parses a reset date given as `YYYY-MM-DD` or RFC 3339.
fn parse_reset_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

// ============================================================================
// API Client
// ============================================================================

/// Copilot token-channel API client.
#[derive(Debug, Clone)]
pub struct CopilotApiClient {
    http: HttpClient,
    api_base: String,
}

impl CopilotApiClient {
    /// Creates a client against `api_base`.
    pub fn new(http: HttpClient, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn build_headers(token: &str) -> Result<HeaderMap, CopilotError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("Editor-Version", HeaderValue::from_static(EDITOR_VERSION));
        headers.insert(
            "Editor-Plugin-Version",
            HeaderValue::from_static(EDITOR_PLUGIN_VERSION),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        let auth = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|e| CopilotError::AuthenticationFailed(format!("Invalid token: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    /// Fetches the quota snapshot for `token`.
    ///
    /// # Errors
    ///
    /// - [`CopilotError::AuthenticationFailed`] on 401/403
    /// - [`CopilotError::NotEnabled`] on 404
    /// - [`CopilotError::RateLimited`] on 429
    /// - [`CopilotError::HttpError`] on transport failure or other statuses
    /// - [`CopilotError::InvalidResponse`] on malformed JSON
    #[instrument(skip(self, token))]
    pub async fn fetch_usage(&self, token: &str) -> Result<TokenUsage, CopilotError> {
        debug!("Fetching Copilot quota snapshot");

        let url = format!("{}{COPILOT_USER_ENDPOINT}", self.api_base);
        let response = self
            .http
            .get_with_headers(&url, Self::build_headers(token)?)
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CopilotError::AuthenticationFailed(format!(
                "Token rejected (HTTP {status})"
            )));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CopilotError::NotEnabled);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CopilotError::RateLimited(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(CopilotError::HttpError(format!("HTTP {status}")));
        }

        let body = response.text().await?;
        let doc: Value = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "Failed to parse Copilot user response");
            CopilotError::InvalidResponse(format!("JSON error: {e}"))
        })?;

        TokenUsage::from_json(&doc)
    }
}

// ============================================================================
// Tests
// ============================================================================
