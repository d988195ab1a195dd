//! Provider registry.
//!
//! Builds the production provider list handed to the orchestrator and maps
//! CLI names (with aliases) to provider kinds.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use usagebar_core::{ProviderKind, UsageProvider};
use usagebar_fetch::FetchContext;

use crate::antigravity::{AntigravityConfig, AntigravityProvider};
use crate::copilot::{CopilotConfig, CopilotProvider, CustomerIdCache};

// ============================================================================
// Static State
// ============================================================================

/// Extra CLI names accepted for each provider.
const ALIASES: &[(&str, ProviderKind)] = &[
    ("github", ProviderKind::Copilot),
    ("gh", ProviderKind::Copilot),
    ("ag", ProviderKind::Antigravity),
];

/// CLI name to provider kind mapping.
static CLI_NAME_MAP: OnceLock<HashMap<String, ProviderKind>> = OnceLock::new();

/// Customer id memo shared by every Copilot provider in the process.
static CUSTOMER_ID_CACHE: OnceLock<CustomerIdCache> = OnceLock::new();

fn build_cli_name_map() -> HashMap<String, ProviderKind> {
    let mut map: HashMap<String, ProviderKind> = ProviderKind::all()
        .iter()
        .map(|kind| (kind.cli_name().to_string(), *kind))
        .collect();
    for (alias, kind) in ALIASES {
        map.insert((*alias).to_string(), *kind);
    }
    map
}

// ============================================================================
// Provider Registry
// ============================================================================

/// Entry point for constructing providers.
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Returns the CLI name to provider kind mapping.
    pub fn cli_name_map() -> &'static HashMap<String, ProviderKind> {
        CLI_NAME_MAP.get_or_init(build_cli_name_map)
    }

    /// Looks up a provider kind by CLI name or alias (case-insensitive).
    pub fn kind_by_cli_name(name: &str) -> Option<ProviderKind> {
        Self::cli_name_map()
            .get(&name.trim().to_ascii_lowercase())
            .copied()
    }

    /// The process-wide customer id cache.
    pub fn customer_id_cache() -> CustomerIdCache {
        CUSTOMER_ID_CACHE.get_or_init(CustomerIdCache::new).clone()
    }

    /// Builds the provider for `kind` with its environment configuration.
    pub fn build(kind: ProviderKind, ctx: &FetchContext) -> Arc<dyn UsageProvider> {
        match kind {
            ProviderKind::Copilot => Arc::new(CopilotProvider::with_customer_id_cache(
                ctx,
                CopilotConfig::from_env(),
                Self::customer_id_cache(),
            )),
            ProviderKind::Antigravity => {
                Arc::new(AntigravityProvider::new(AntigravityConfig::from_env()))
            }
        }
    }

    /// Builds the given providers, in order.
    pub fn build_many(kinds: &[ProviderKind], ctx: &FetchContext) -> Vec<Arc<dyn UsageProvider>> {
        kinds.iter().map(|kind| Self::build(*kind, ctx)).collect()
    }
}

/// Every supported provider, configured from the environment.
pub fn default_providers(ctx: &FetchContext) -> Vec<Arc<dyn UsageProvider>> {
    ProviderRegistry::build_many(ProviderKind::all(), ctx)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use usagebar_fetch::{FetchSettings, MemorySecretStore, SecretStore};

    fn context() -> FetchContext {
        let secrets: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new());
        FetchContext::builder()
            .secrets(secrets)
            .settings(FetchSettings::default())
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_providers_cover_every_kind() {
        let providers = default_providers(&context());
        let kinds: Vec<_> = providers.iter().map(|p| p.kind()).collect();
        assert_eq!(kinds, ProviderKind::all());
    }

    #[test]
    fn test_cli_name_lookup() {
        assert_eq!(
            ProviderRegistry::kind_by_cli_name("copilot"),
            Some(ProviderKind::Copilot)
        );
        assert_eq!(
            ProviderRegistry::kind_by_cli_name("GitHub"),
            Some(ProviderKind::Copilot)
        );
        assert_eq!(
            ProviderRegistry::kind_by_cli_name("ag"),
            Some(ProviderKind::Antigravity)
        );
        assert_eq!(ProviderRegistry::kind_by_cli_name("codex"), None);
    }

    #[test]
    fn test_customer_id_cache_is_shared() {
        let a = ProviderRegistry::customer_id_cache();
        let b = ProviderRegistry::customer_id_cache();
        a.set("31337");
        assert_eq!(b.get().as_deref(), Some("31337"));
        a.reset();
    }
}
