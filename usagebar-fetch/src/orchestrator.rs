//! Concurrent provider fetching.
//!
//! The orchestrator runs every registered provider as its own task, races
//! each against the provider timeout and collects the winners into one
//! snapshot. Failures never propagate: a provider that errors, panics or
//! times out is simply absent from the map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use usagebar_core::{ProviderKind, ProviderResult, UsageProvider};

use crate::context::FetchSettings;

/// Snapshot handed to the presentation layer.
pub type Snapshot = HashMap<ProviderKind, ProviderResult>;

// ============================================================================
// Fetch Orchestrator
// ============================================================================

/// Runs providers concurrently under a per-provider timeout.
pub struct FetchOrchestrator {
    providers: Vec<Arc<dyn UsageProvider>>,
    settings: FetchSettings,
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("providers", &self.kinds())
            .field("settings", &self.settings)
            .finish()
    }
}

impl FetchOrchestrator {
    /// Creates an orchestrator over an explicit provider list.
    pub fn new(providers: Vec<Arc<dyn UsageProvider>>, settings: FetchSettings) -> Self {
        Self {
            providers,
            settings,
        }
    }

    /// Registered provider kinds, in registration order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    /// Fetches every provider concurrently.
    ///
    /// Never fails. Returns within roughly the provider timeout even when a
    /// provider never completes.
    #[instrument(skip(self), fields(providers = self.providers.len()))]
    pub async fn fetch_all(&self) -> Snapshot {
        let start = Instant::now();
        let timeout = self.settings.provider_timeout;

        let outcomes = join_all(
            self.providers
                .iter()
                .map(|provider| run_provider(Arc::clone(provider), timeout)),
        )
        .await;

        let snapshot: Snapshot = outcomes.into_iter().flatten().collect();
        info!(
            succeeded = snapshot.len(),
            registered = self.providers.len(),
            duration = ?start.elapsed(),
            "Fetch cycle complete"
        );
        snapshot
    }

    /// Fetches one registered provider under the same timeout rules.
    ///
    /// Returns `None` if the kind is not registered or the fetch failed.
    pub async fn fetch_one(&self, kind: ProviderKind) -> Option<ProviderResult> {
        let provider = self.providers.iter().find(|p| p.kind() == kind)?;
        run_provider(Arc::clone(provider), self.settings.provider_timeout)
            .await
            .map(|(_, result)| result)
    }
}

async fn run_provider(
    provider: Arc<dyn UsageProvider>,
    timeout: Duration,
) -> Option<(ProviderKind, ProviderResult)> {
    let kind = provider.kind();
    let start = Instant::now();
    debug!(provider = %kind, "Starting provider fetch");

    let mut handle = tokio::spawn(async move { provider.fetch().await });

    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(Ok(result))) => {
            debug!(provider = %kind, duration = ?start.elapsed(), "Provider fetch succeeded");
            Some((kind, result))
        }
        Ok(Ok(Err(error))) => {
            warn!(
                provider = %kind,
                category = error.category(),
                error = %error,
                "Provider fetch failed"
            );
            None
        }
        Ok(Err(join_error)) => {
            warn!(
                provider = %kind,
                panicked = join_error.is_panic(),
                error = %join_error,
                "Provider task aborted"
            );
            None
        }
        Err(_) => {
            handle.abort();
            warn!(provider = %kind, timeout = ?timeout, "Provider fetch timed out");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use usagebar_core::{ProviderError, Usage};

    enum Behavior {
        Succeed(i64),
        Fail,
        Hang,
        Panic,
    }

    struct MockProvider {
        kind: ProviderKind,
        behavior: Behavior,
    }

    impl MockProvider {
        fn arc(kind: ProviderKind, behavior: Behavior) -> Arc<dyn UsageProvider> {
            Arc::new(Self { kind, behavior })
        }
    }

    #[async_trait]
    impl UsageProvider for MockProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn fetch(&self) -> Result<ProviderResult, ProviderError> {
            match self.behavior {
                Behavior::Succeed(remaining) => Ok(ProviderResult::single(
                    Usage::quota(remaining, 100, false),
                    None,
                )),
                Behavior::Fail => Err(ProviderError::Network("connection reset".into())),
                Behavior::Hang => std::future::pending().await,
                Behavior::Panic => panic!("provider bug"),
            }
        }
    }

    fn settings(ms: u64) -> FetchSettings {
        FetchSettings::default().with_provider_timeout(Duration::from_millis(ms))
    }

    #[tokio::test]
    async fn test_hanging_provider_is_dropped_within_timeout() {
        let orchestrator = FetchOrchestrator::new(
            vec![
                MockProvider::arc(ProviderKind::Copilot, Behavior::Succeed(42)),
                MockProvider::arc(ProviderKind::Antigravity, Behavior::Hang),
            ],
            settings(100),
        );

        let start = Instant::now();
        let snapshot = orchestrator.fetch_all().await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&ProviderKind::Copilot].usage.remaining(), Some(42));
        assert!(!snapshot.contains_key(&ProviderKind::Antigravity));
    }

    #[tokio::test]
    async fn test_error_provider_is_absent() {
        let orchestrator = FetchOrchestrator::new(
            vec![
                MockProvider::arc(ProviderKind::Copilot, Behavior::Fail),
                MockProvider::arc(ProviderKind::Antigravity, Behavior::Succeed(1)),
            ],
            settings(1_000),
        );

        let snapshot = orchestrator.fetch_all().await;
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&ProviderKind::Antigravity));
    }

    #[tokio::test]
    async fn test_panicking_provider_does_not_escape() {
        let orchestrator = FetchOrchestrator::new(
            vec![MockProvider::arc(ProviderKind::Copilot, Behavior::Panic)],
            settings(1_000),
        );

        assert!(orchestrator.fetch_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_providers_gives_empty_snapshot() {
        let orchestrator = FetchOrchestrator::new(Vec::new(), settings(1_000));
        assert!(orchestrator.fetch_all().await.is_empty());
        assert!(orchestrator.kinds().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_one() {
        let orchestrator = FetchOrchestrator::new(
            vec![
                MockProvider::arc(ProviderKind::Copilot, Behavior::Succeed(7)),
                MockProvider::arc(ProviderKind::Antigravity, Behavior::Hang),
            ],
            settings(50),
        );

        assert_eq!(
            orchestrator.kinds(),
            vec![ProviderKind::Copilot, ProviderKind::Antigravity]
        );
        let copilot = orchestrator.fetch_one(ProviderKind::Copilot).await.unwrap();
        assert_eq!(copilot.usage.remaining(), Some(7));
        assert!(orchestrator.fetch_one(ProviderKind::Antigravity).await.is_none());
    }
}
