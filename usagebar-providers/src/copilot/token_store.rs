//! Copilot token discovery.
//!
//! A GitHub token can live in several places at once, each a separate
//! credential channel with its own [`SourcePriority`]:
//!
//! 1. **Environment** - `COPILOT_API_TOKEN` or `GITHUB_TOKEN` (primary)
//! 2. **Keychain** - gh CLI / Copilot entries in the OS keychain
//! 3. **IDE config** - `~/.config/github-copilot/{apps,hosts}.json`
//! 4. **gh CLI** - `~/.config/gh/hosts.yml`
//!
//! Discovery is blocking (file and keychain reads).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use usagebar_core::SourcePriority;
use usagebar_fetch::SecretStore;

use super::config::CopilotConfig;

// ============================================================================
// Constants
// ============================================================================

/// Keychain entries checked, in order.
const KEYCHAIN_ENTRIES: &[(&str, &str)] = &[
    ("gh:github.com", ""),
    ("github.com/copilot", "oauth_token"),
];

/// Prefix go-keyring puts on encoded secrets.
const GO_KEYRING_PREFIX: &str = "go-keyring-base64:";

/// IDE config files, in order.
const IDE_CONFIG_FILES: &[&str] = &["apps.json", "hosts.json"];

// ============================================================================
// Token Source
// ============================================================================

/// A token found in one credential channel.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSource {
    /// The token.
    pub token: String,
    /// Channel rank.
    pub priority: SourcePriority,
    /// Where the token was found, for logs.
    pub origin: String,
    /// Login recorded next to the token, if any.
    pub login_hint: Option<String>,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("priority", &self.priority)
            .field("origin", &self.origin)
            .field("login_hint", &self.login_hint)
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    fn new(token: impl Into<String>, priority: SourcePriority, origin: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            priority,
            origin: origin.into(),
            login_hint: None,
        }
    }

    fn with_login(mut self, login: Option<String>) -> Self {
        self.login_hint = login.filter(|l| !l.is_empty());
        self
    }
}

// ============================================================================
// Config File Shapes
// ============================================================================

/// One entry of the IDE `apps.json` / `hosts.json` map.
#[derive(Debug, Deserialize)]
struct IdeHostEntry {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    oauth_token: Option<String>,
}

/// GitHub CLI hosts configuration.
#[derive(Debug, Deserialize)]
struct GhHosts {
    #[serde(rename = "github.com")]
    github: Option<GhHostConfig>,
}

/// GitHub CLI host configuration.
#[derive(Debug, Deserialize)]
struct GhHostConfig {
    #[serde(default)]
    oauth_token: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    users: BTreeMap<String, GhUserConfig>,
}

/// Per-user entry in newer gh CLI configs.
#[derive(Debug, Deserialize)]
struct GhUserConfig {
    #[serde(default)]
    oauth_token: Option<String>,
}

// ============================================================================
// Token Store
// ============================================================================

/// Finds tokens across every configured channel.
#[derive(Clone)]
pub struct CopilotTokenStore {
    config: CopilotConfig,
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for CopilotTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopilotTokenStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CopilotTokenStore {
    /// Creates a token store.
    pub fn new(config: CopilotConfig, secrets: Arc<dyn SecretStore>) -> Self {
        Self { config, secrets }
    }

    /// Names of the channels this store will consult.
    pub fn channel_names(&self) -> Vec<&'static str> {
        let mut names = vec![SourcePriority::PrimaryToken.channel_name()];
        if self.config.use_keychain {
            names.push(SourcePriority::NativeKeychain.channel_name());
        }
        names.push(SourcePriority::IdeConfig.channel_name());
        names.push(SourcePriority::OtherConfig.channel_name());
        names
    }

    /// Every distinct token, highest priority first.
    ///
    /// A token found in more than one place is kept once, under its most
    /// trusted channel.
    #[instrument(skip(self))]
    pub fn discover(&self) -> Vec<TokenSource> {
        let mut sources = Vec::new();

        if let Some((origin, token)) = &self.config.primary_token {
            sources.push(TokenSource::new(
                token.clone(),
                SourcePriority::PrimaryToken,
                format!("env:{origin}"),
            ));
        }
        if self.config.use_keychain {
            sources.extend(self.load_from_keychain());
        }
        if let Some(dir) = &self.config.ide_config_dir {
            sources.extend(load_from_ide_config(dir));
        }
        if let Some(path) = &self.config.gh_hosts_path {
            sources.extend(load_from_gh_cli(path));
        }

        let sources = dedup_tokens(sources);
        debug!(count = sources.len(), "Discovered Copilot tokens");
        sources
    }

    fn load_from_keychain(&self) -> Vec<TokenSource> {
        KEYCHAIN_ENTRIES
            .iter()
            .filter_map(|(service, account)| match self.secrets.get(service, account) {
                Ok(Some(secret)) => Some(TokenSource::new(
                    decode_keyring_secret(&secret),
                    SourcePriority::NativeKeychain,
                    format!("keychain:{service}"),
                )),
                Ok(None) => None,
                Err(e) => {
                    warn!(service, error = %e, "Keychain lookup failed");
                    None
                }
            })
            .collect()
    }
}

/// Unwraps go-keyring's base64 encoding when present.
fn decode_keyring_secret(secret: &str) -> String {
    secret
        .strip_prefix(GO_KEYRING_PREFIX)
        .and_then(|encoded| STANDARD.decode(encoded).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| secret.to_string())
}

fn load_from_ide_config(dir: &Path) -> Vec<TokenSource> {
    let mut sources = Vec::new();
    for file in IDE_CONFIG_FILES {
        let path = dir.join(file);
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let entries: HashMap<String, IdeHostEntry> = match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable Copilot IDE config");
                continue;
            }
        };

        let mut keys: Vec<_> = entries.keys().cloned().collect();
        keys.sort();
        for key in keys {
            if !key.starts_with("github.com") {
                continue;
            }
            let Some(entry) = entries.get(&key) else { continue };
            if let Some(token) = entry.oauth_token.as_deref().filter(|t| !t.is_empty()) {
                sources.push(
                    TokenSource::new(token, SourcePriority::IdeConfig, format!("ide:{file}"))
                        .with_login(entry.user.clone()),
                );
            }
        }
    }
    sources
}

fn load_from_gh_cli(path: &Path) -> Vec<TokenSource> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let hosts: GhHosts = match serde_yaml::from_str(&content) {
        Ok(hosts) => hosts,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable gh CLI hosts file");
            return Vec::new();
        }
    };
    let Some(host) = hosts.github else {
        return Vec::new();
    };

    let mut sources = Vec::new();
    if let Some(token) = host.oauth_token.filter(|t| !t.is_empty()) {
        sources.push(
            TokenSource::new(token, SourcePriority::OtherConfig, "gh:hosts.yml")
                .with_login(host.user.clone()),
        );
    }
    for (login, user) in host.users {
        if let Some(token) = user.oauth_token.filter(|t| !t.is_empty()) {
            sources.push(
                TokenSource::new(token, SourcePriority::OtherConfig, "gh:hosts.yml")
                    .with_login(Some(login)),
            );
        }
    }
    sources
}

/// Keeps the first occurrence of each token after sorting by priority.
fn dedup_tokens(mut sources: Vec<TokenSource>) -> Vec<TokenSource> {
    sources.sort_by_key(|s| std::cmp::Reverse(s.priority.rank()));
    let mut kept: Vec<TokenSource> = Vec::new();
    for source in sources {
        if let Some(existing) = kept.iter_mut().find(|k| k.token == source.token) {
            if existing.login_hint.is_none() {
                existing.login_hint = source.login_hint;
            }
            continue;
        }
        kept.push(source);
    }
    kept
}

// ============================================================================
// Tests
// ============================================================================
