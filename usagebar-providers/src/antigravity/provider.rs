//! The Antigravity usage provider.

use async_trait::async_trait;
use tracing::{debug, instrument};
use usagebar_core::{
    ProviderError, ProviderKind, ProviderResult, Usage, UsageDetails, UsageProvider,
};

use super::cache::{AntigravityConfig, AntigravitySnapshot, read_state_db};
use super::error::AntigravityError;

/// Antigravity per-model quotas from the local state cache.
#[derive(Debug, Clone, Default)]
pub struct AntigravityProvider {
    config: AntigravityConfig,
}

impl AntigravityProvider {
    /// Creates the provider.
    pub fn new(config: AntigravityConfig) -> Self {
        Self { config }
    }

    async fn read_snapshot(&self) -> Result<AntigravitySnapshot, AntigravityError> {
        let Some(path) = self.config.state_db.clone() else {
            return Err(AntigravityError::NotInstalled("no home directory".to_string()));
        };
        tokio::task::spawn_blocking(move || read_state_db(&path))
            .await
            .map_err(|e| AntigravityError::Database(format!("reader task failed: {e}")))?
    }
}

/// Converts a snapshot to the provider result.
///
/// The top-level usage is the most exhausted model as a percentage of 100.
///
/// # Errors
///
/// Returns [`AntigravityError::NoData`] when no model carries a quota.
#[allow(clippy::cast_possible_truncation)]
pub fn snapshot_to_result(
    snapshot: AntigravitySnapshot,
) -> Result<ProviderResult, AntigravityError> {
    let worst = snapshot
        .most_constrained()
        .ok_or(AntigravityError::NoData)?;
    let remaining = worst.remaining_percent().round() as i64;
    let resets_at = worst.reset_time;

    let details = UsageDetails {
        login: snapshot.email,
        resets_at,
        channel: Some("local_cache".to_string()),
        models: snapshot.models,
        ..Default::default()
    };

    Ok(ProviderResult::single(
        Usage::quota(remaining, 100, false),
        Some(details),
    ))
}

#[async_trait]
impl UsageProvider for AntigravityProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Antigravity
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<ProviderResult, ProviderError> {
        let snapshot = self.read_snapshot().await?;
        debug!(models = snapshot.models.len(), "Antigravity cache read");
        snapshot_to_result(snapshot).map_err(ProviderError::from)
    }
}
