//! Fetch context providing access to host APIs.
//!
//! The context is handed to every provider and bundles the secret store,
//! the HTTP client, the browser cookie importer and the settings.

use std::sync::Arc;
use std::time::Duration;

use crate::error::HttpError;
use crate::host::{
    browser::BrowserCookieImporter,
    http::HttpClient,
    keychain::{SecretStore, SystemSecretStore},
};

/// Browser-like user agent sent to session endpoints.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Upper bound on history pages fetched per cycle.
pub const MAX_HISTORY_PAGES: usize = 3;

/// Upper bound on history rows kept per cycle.
pub const MAX_HISTORY_DAYS: usize = 30;

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Time each provider gets before the orchestrator gives up on it.
    pub provider_timeout: Duration,
    /// Timeout for individual HTTP requests.
    pub http_timeout: Duration,
    /// User agent for outbound requests.
    pub user_agent: String,
    /// Maximum history pages.
    pub max_history_pages: usize,
    /// Maximum history rows.
    pub max_history_days: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_history_pages: MAX_HISTORY_PAGES,
            max_history_days: MAX_HISTORY_DAYS,
        }
    }
}

impl FetchSettings {
    /// Sets the per-provider timeout.
    #[must_use]
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Sets the history window bounds.
    #[must_use]
    pub fn with_history_bounds(mut self, pages: usize, days: usize) -> Self {
        self.max_history_pages = pages;
        self.max_history_days = days;
        self
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Context provided to providers, giving access to host APIs.
#[derive(Clone)]
pub struct FetchContext {
    /// Platform secret store.
    pub secrets: Arc<dyn SecretStore>,
    /// HTTP client with tracing.
    pub http: HttpClient,
    /// Browser cookie importer.
    pub browser: Arc<BrowserCookieImporter>,
    /// Fetch settings.
    pub settings: FetchSettings,
}

impl FetchContext {
    /// Creates a context with system host APIs.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: FetchSettings) -> Result<Self, HttpError> {
        Self::builder().settings(settings).build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder() -> FetchContextBuilder {
        FetchContextBuilder::new()
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Context Builder
// ============================================================================

/// Builder for constructing a [`FetchContext`].
#[derive(Default)]
pub struct FetchContextBuilder {
    secrets: Option<Arc<dyn SecretStore>>,
    http: Option<HttpClient>,
    browser: Option<Arc<BrowserCookieImporter>>,
    settings: FetchSettings,
}

impl FetchContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the secret store.
    #[must_use]
    pub fn secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Sets the HTTP client.
    #[must_use]
    pub fn http(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the browser cookie importer.
    #[must_use]
    pub fn browser(mut self, browser: Arc<BrowserCookieImporter>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Sets the fetch settings.
    #[must_use]
    pub fn settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Builds the context.
    ///
    /// The browser importer defaults to one sharing the context's secret
    /// store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn build(self) -> Result<FetchContext, HttpError> {
        let secrets = self
            .secrets
            .unwrap_or_else(|| Arc::new(SystemSecretStore::new()));
        let http = match self.http {
            Some(http) => http,
            None => HttpClient::new(&self.settings)?,
        };
        let browser = self
            .browser
            .unwrap_or_else(|| Arc::new(BrowserCookieImporter::new(Arc::clone(&secrets))));

        Ok(FetchContext {
            secrets,
            http,
            browser,
            settings: self.settings,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
