//! The Copilot usage provider.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, instrument, warn};
use usagebar_core::{
    AccountCandidate, ProviderError, ProviderKind, ProviderResult, SourcePriority, UsageProvider,
    reconcile,
};
use usagebar_fetch::{BrowserCookieImporter, CookieJar, FetchContext, SecretStore};

use super::api::CopilotApiClient;
use super::candidates::build_candidates;
use super::config::CopilotConfig;
use super::session::{CopilotSessionClient, CustomerIdCache, SessionUsage};
use super::token_store::{CopilotTokenStore, TokenSource};

/// Cookie domain of the GitHub web session.
const SESSION_DOMAIN: &str = "github.com";

/// Copilot premium-request usage across every local account.
#[derive(Debug, Clone)]
pub struct CopilotProvider {
    config: CopilotConfig,
    token_store: CopilotTokenStore,
    api: CopilotApiClient,
    session: CopilotSessionClient,
    browser: Arc<BrowserCookieImporter>,
}

impl CopilotProvider {
    /// Creates the provider from the shared fetch context.
    pub fn new(ctx: &FetchContext, config: CopilotConfig) -> Self {
        Self::with_customer_id_cache(ctx, config, CustomerIdCache::new())
    }

    /// Creates the provider with a caller-owned customer id cache.
    pub fn with_customer_id_cache(
        ctx: &FetchContext,
        config: CopilotConfig,
        cache: CustomerIdCache,
    ) -> Self {
        let secrets: Arc<dyn SecretStore> = Arc::clone(&ctx.secrets);
        let http = ctx.http.clone().with_allowed_domains(config.allowed_hosts());
        Self {
            token_store: CopilotTokenStore::new(config.clone(), secrets),
            api: CopilotApiClient::new(http.clone(), config.api_base.clone()),
            session: CopilotSessionClient::new(
                http,
                config.web_base.clone(),
                cache,
                &ctx.settings,
            ),
            browser: Arc::clone(&ctx.browser),
            config,
        }
    }

    fn attempted_channels(&self) -> Vec<&'static str> {
        let mut channels = self.token_store.channel_names();
        if self.config.use_browser_session {
            channels.push(SourcePriority::BrowserSession.channel_name());
        }
        channels
    }

    async fn discover_tokens(&self) -> Vec<TokenSource> {
        let store = self.token_store.clone();
        match tokio::task::spawn_blocking(move || store.discover()).await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "Token discovery task failed");
                Vec::new()
            }
        }
    }

    async fn token_candidate(&self, source: TokenSource) -> Option<AccountCandidate> {
        match self.api.fetch_usage(&source.token).await {
            Ok(mut usage) => {
                if usage.login.is_none() {
                    usage.login = source.login_hint;
                }
                Some(usage.into_candidate(source.priority))
            }
            Err(e) => {
                warn!(origin = %source.origin, error = %e, "Token channel yielded no data");
                None
            }
        }
    }

    async fn token_candidates(&self) -> Vec<AccountCandidate> {
        let sources = self.discover_tokens().await;
        join_all(sources.into_iter().map(|s| self.token_candidate(s)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn find_session_jar(&self) -> Option<CookieJar> {
        let browser = Arc::clone(&self.browser);
        let found = tokio::task::spawn_blocking(move || browser.find_session(SESSION_DOMAIN)).await;
        match found {
            Ok(Ok(Some((profile, jar)))) => {
                debug!(profile = %profile.display_name, "Using browser session");
                Some(jar)
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!(error = %e, "Browser cookie import failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "Browser cookie task failed");
                None
            }
        }
    }

    async fn session_usage(&self) -> Option<SessionUsage> {
        if !self.config.use_browser_session {
            return None;
        }
        let jar = self.find_session_jar().await?;
        match self.session.fetch(&jar).await {
            Ok(usage) => usage,
            Err(e) => {
                warn!(error = %e, "Browser session yielded no data");
                None
            }
        }
    }
}

#[async_trait]
impl UsageProvider for CopilotProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Copilot
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<ProviderResult, ProviderError> {
        let (tokens, session) = tokio::join!(self.token_candidates(), self.session_usage());
        debug!(
            tokens = tokens.len(),
            session = session.is_some(),
            "Collected Copilot channels"
        );

        let candidates = build_candidates(tokens, session);
        reconcile(candidates, &self.attempted_channels())
    }
}
