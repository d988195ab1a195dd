//! Browser-session client for the GitHub billing pages.
//!
//! The session channel reads premium-request usage the way the billing UI
//! does: the settings page yields a numeric customer id, which then keys the
//! usage-card and usage-table JSON endpoints. Every call carries the cookie
//! jar of a logged-in browser profile.

use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use usagebar_core::DailyUsage;
use usagebar_fetch::{CookieJar, FetchSettings, HttpClient};

use super::error::CopilotError;
use super::parser::{self, UsageCard};

// ============================================================================
// Constants
// ============================================================================

/// Billing settings page carrying the customer id.
const BILLING_PAGE: &str = "/settings/billing";

/// Usage card endpoint.
const USAGE_CARD_ENDPOINT: &str = "/settings/billing/copilot_usage_card";

/// Paginated daily usage endpoint.
const USAGE_TABLE_ENDPOINT: &str = "/settings/billing/copilot_usage_table";

/// Billing period selector the UI uses for the current cycle.
const BILLING_PERIOD: u32 = 3;

// ============================================================================
// Customer Id Cache
// ============================================================================

/// Process-lifetime memo of the billing customer id.
///
/// Cloning shares the same slot. Entries never expire; call
/// [`CustomerIdCache::reset`] to forget the id.
#[derive(Debug, Clone, Default)]
pub struct CustomerIdCache {
    inner: Arc<Mutex<Option<String>>>,
}

impl CustomerIdCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized id.
    pub fn get(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|slot| slot.clone())
    }

    /// Stores `id`.
    pub fn set(&self, id: impl Into<String>) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(id.into());
        }
    }

    /// Forgets the memoized id.
    pub fn reset(&self) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = None;
        }
    }
}

// ============================================================================
// Session Usage
// ============================================================================

/// Usage recovered through a browser session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUsage {
    /// Login recorded in the session cookies.
    pub login: Option<String>,
    /// Usage card numbers.
    pub card: UsageCard,
    /// Recent daily rows, most recent first.
    pub history: Vec<DailyUsage>,
}

// ============================================================================
// Session Client
// ============================================================================

/// Cookie-authenticated client for the billing endpoints.
#[derive(Debug, Clone)]
pub struct CopilotSessionClient {
    http: HttpClient,
    web_base: String,
    cache: CustomerIdCache,
    user_agent: String,
    max_history_pages: usize,
    max_history_days: usize,
}

impl CopilotSessionClient {
    /// Creates a client against `web_base`.
    pub fn new(
        http: HttpClient,
        web_base: impl Into<String>,
        cache: CustomerIdCache,
        settings: &FetchSettings,
    ) -> Self {
        Self {
            http,
            web_base: web_base.into().trim_end_matches('/').to_string(),
            cache,
            user_agent: settings.user_agent.clone(),
            max_history_pages: settings.max_history_pages,
            max_history_days: settings.max_history_days,
        }
    }

    fn build_headers(
        &self,
        jar: &CookieJar,
        accept: &'static str,
    ) -> Result<HeaderMap, CopilotError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| CopilotError::HttpError(format!("Invalid user agent: {e}")))?,
        );
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&jar.header())
                .map_err(|e| CopilotError::AuthenticationFailed(format!("Invalid cookie: {e}")))?,
        );
        Ok(headers)
    }

    /// GETs `url` and returns the body, or `None` for any non-2xx status.
    async fn get_text(
        &self,
        url: &str,
        jar: &CookieJar,
        accept: &'static str,
    ) -> Result<Option<String>, CopilotError> {
        let response = self
            .http
            .get_with_headers(url, self.build_headers(jar, accept)?)
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(%status, "Session rejected");
            return Ok(None);
        }
        if !status.is_success() {
            warn!(%status, "Unexpected billing response");
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }

    async fn get_json(&self, url: &str, jar: &CookieJar) -> Result<Option<Value>, CopilotError> {
        let Some(body) = self.get_text(url, jar, "application/json").await? else {
            return Ok(None);
        };
        match serde_json::from_str(&body) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                warn!(error = %e, "Billing response is not JSON");
                Ok(None)
            }
        }
    }

    /// Resolves the customer id, from the cache or the settings page.
    async fn customer_id(&self, jar: &CookieJar) -> Result<Option<String>, CopilotError> {
        if let Some(id) = self.cache.get() {
            return Ok(Some(id));
        }

        let url = format!("{}{BILLING_PAGE}", self.web_base);
        let Some(html) = self.get_text(&url, jar, "text/html").await? else {
            return Ok(None);
        };

        let id = parser::extract_customer_id(&html);
        match &id {
            Some(id) => {
                debug!("Resolved billing customer id");
                self.cache.set(id.clone());
            }
            None => debug!("No customer id on billing page"),
        }
        Ok(id)
    }

    async fn fetch_card(
        &self,
        jar: &CookieJar,
        id: &str,
    ) -> Result<Option<UsageCard>, CopilotError> {
        let url = format!(
            "{}{USAGE_CARD_ENDPOINT}?customer_id={id}&period={BILLING_PERIOD}",
            self.web_base
        );
        Ok(self
            .get_json(&url, jar)
            .await?
            .as_ref()
            .and_then(parser::parse_usage_card))
    }

    async fn fetch_history_pages(
        &self,
        jar: &CookieJar,
        id: &str,
    ) -> Result<Vec<DailyUsage>, CopilotError> {
        let mut days = Vec::new();
        for page in 1..=self.max_history_pages {
            if days.len() >= self.max_history_days {
                break;
            }
            let url = format!(
                "{}{USAGE_TABLE_ENDPOINT}?customer_id={id}&group=0\
                 &period={BILLING_PERIOD}&query=&page={page}",
                self.web_base
            );
            let Some(doc) = self.get_json(&url, jar).await? else {
                break;
            };
            let rows = parser::parse_usage_table(&doc);
            if rows.is_empty() {
                break;
            }
            days.extend(rows);
        }
        days.truncate(self.max_history_days);
        Ok(days)
    }

    /// Recovers a bounded window of daily history. Never fails.
    async fn fetch_history(&self, jar: &CookieJar, id: &str) -> Vec<DailyUsage> {
        match self.fetch_history_pages(jar, id).await {
            Ok(days) => days,
            Err(e) => {
                debug!(error = %e, "History unavailable");
                Vec::new()
            }
        }
    }

    /// Fetches session usage with `jar`.
    ///
    /// Returns `Ok(None)` when the session is rejected, no customer id can
    /// be found, or the usage card is unusable.
    ///
    /// # Errors
    ///
    /// Returns [`CopilotError::HttpError`] on transport failure.
    #[instrument(skip(self, jar))]
    pub async fn fetch(&self, jar: &CookieJar) -> Result<Option<SessionUsage>, CopilotError> {
        let Some(id) = self.customer_id(jar).await? else {
            return Ok(None);
        };

        let (card, history) = tokio::join!(self.fetch_card(jar, &id), self.fetch_history(jar, &id));

        let Some(card) = card? else {
            return Ok(None);
        };

        debug!(
            used = card.used(),
            entitlement = card.entitlement,
            days = history.len(),
            "Session usage fetched"
        );

        Ok(Some(SessionUsage {
            login: jar.login().map(str::to_string),
            card,
            history,
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use usagebar_fetch::DecryptedCookie;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jar() -> CookieJar {
        CookieJar::new(vec![
            DecryptedCookie {
                name: "user_session".into(),
                value: "abc".into(),
            },
            DecryptedCookie {
                name: "logged_in".into(),
                value: "yes".into(),
            },
            DecryptedCookie {
                name: "dotcom_user".into(),
                value: "alice".into(),
            },
        ])
    }

    fn client(server: &MockServer, cache: CustomerIdCache) -> CopilotSessionClient {
        let settings = FetchSettings::default();
        let http = HttpClient::new(&settings).unwrap();
        CopilotSessionClient::new(http, server.uri(), cache, &settings)
    }

    fn card_body() -> Value {
        json!({
            "netQuantity": 0,
            "discountQuantity": 700,
            "userPremiumRequestEntitlement": 1000,
            "netBilledAmount": 0
        })
    }

    async fn mount_billing_page(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(BILLING_PAGE))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<script>{"customerId": 4242}</script>"#),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        mount_billing_page(&server).await;
        Mock::given(path(USAGE_CARD_ENDPOINT))
            .and(query_param("customer_id", "4242"))
            .and(header("x-requested-with", "XMLHttpRequest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(card_body()))
            .mount(&server)
            .await;
        Mock::given(path(USAGE_TABLE_ENDPOINT))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "table": {"rows": [{"cells": [
                    {"value": "Jan 3"}, {"value": 5}, {"value": 0},
                    {"value": "$0.20"}, {"value": "$0"}
                ]}]}
            })))
            .mount(&server)
            .await;

        let usage = client(&server, CustomerIdCache::new())
            .fetch(&jar())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(usage.login.as_deref(), Some("alice"));
        assert_eq!(usage.card.remaining(), 300);
        assert_eq!(usage.history.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_billing_page_is_no_data() {
        for status in [401, 403] {
            let server = MockServer::start().await;
            Mock::given(path(BILLING_PAGE))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let result = client(&server, CustomerIdCache::new()).fetch(&jar()).await;
            assert!(matches!(result, Ok(None)));
        }
    }

    #[tokio::test]
    async fn test_rejected_usage_card_is_no_data() {
        for status in [401, 403] {
            let server = MockServer::start().await;
            mount_billing_page(&server).await;
            Mock::given(path(USAGE_CARD_ENDPOINT))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let result = client(&server, CustomerIdCache::new()).fetch(&jar()).await;
            assert!(matches!(result, Ok(None)));
        }
    }

    #[tokio::test]
    async fn test_no_customer_id_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(path(BILLING_PAGE))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let cache = CustomerIdCache::new();
        let result = client(&server, cache.clone()).fetch(&jar()).await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(cache.get(), None);
    }

    #[tokio::test]
    async fn test_invalid_card_json_is_no_data() {
        let server = MockServer::start().await;
        mount_billing_page(&server).await;
        Mock::given(path(USAGE_CARD_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client(&server, CustomerIdCache::new()).fetch(&jar()).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_history_failure_is_not_fatal() {
        let server = MockServer::start().await;
        mount_billing_page(&server).await;
        Mock::given(path(USAGE_CARD_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(card_body()))
            .mount(&server)
            .await;
        Mock::given(path(USAGE_TABLE_ENDPOINT))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let usage = client(&server, CustomerIdCache::new())
            .fetch(&jar())
            .await
            .unwrap()
            .unwrap();
        assert!(usage.history.is_empty());
    }

    #[tokio::test]
    async fn test_customer_id_is_memoized() {
        let server = MockServer::start().await;
        Mock::given(path(BILLING_PAGE))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"data-customer-id="9""#),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path(USAGE_CARD_ENDPOINT))
            .and(query_param("customer_id", "9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(card_body()))
            .mount(&server)
            .await;

        let cache = CustomerIdCache::new();
        let session = client(&server, cache.clone());
        assert!(session.fetch(&jar()).await.unwrap().is_some());
        assert!(session.fetch(&jar()).await.unwrap().is_some());
        assert_eq!(cache.get().as_deref(), Some("9"));

        cache.reset();
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn test_cache_clones_share_slot() {
        let cache = CustomerIdCache::new();
        let other = cache.clone();
        cache.set("1");
        assert_eq!(other.get().as_deref(), Some("1"));
    }
}
