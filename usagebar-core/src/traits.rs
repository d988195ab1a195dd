//! Trait definitions for `UsageBar`.
//!
//! This module defines the contract every provider implementation satisfies.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::{ProviderKind, ProviderResult};

/// A source of usage data for one provider.
///
/// Implementors are responsible for:
/// - Discovering credentials across their channels
/// - Fetching current usage information
/// - Reconciling everything they found into exactly one [`ProviderResult`]
///
/// Implementations must be safe to run concurrently with every other
/// provider; the orchestrator gives no ordering guarantees.
#[async_trait]
pub trait UsageProvider: Send + Sync {
    /// Returns the kind of provider this implementation handles.
    fn kind(&self) -> ProviderKind;

    /// Returns the display name for this provider.
    fn display_name(&self) -> &str {
        self.kind().display_name()
    }

    /// Fetches and reconciles current usage.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when no usable data could be produced.
    async fn fetch(&self) -> Result<ProviderResult, ProviderError>;
}
