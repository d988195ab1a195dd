//! Copilot provider configuration.

use std::path::PathBuf;

/// Environment variable for the primary Copilot token.
pub const COPILOT_TOKEN_ENV: &str = "COPILOT_API_TOKEN";

/// Fallback environment variable (GitHub token).
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// GitHub REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// GitHub web base URL.
pub const DEFAULT_WEB_BASE: &str = "https://github.com";

/// Endpoints and credential locations for the Copilot provider.
///
/// Every path can be overridden so tests can point at temp directories and
/// mock servers.
#[derive(Debug, Clone)]
pub struct CopilotConfig {
    /// REST API base URL.
    pub api_base: String,
    /// Web (session) base URL.
    pub web_base: String,
    /// Primary token, usually taken from the environment.
    pub primary_token: Option<(String, String)>,
    /// IDE config directory (`~/.config/github-copilot`).
    pub ide_config_dir: Option<PathBuf>,
    /// gh CLI hosts file.
    pub gh_hosts_path: Option<PathBuf>,
    /// Whether to consult the OS keychain.
    pub use_keychain: bool,
    /// Whether to look for browser sessions.
    pub use_browser_session: bool,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        let config_home = dirs::home_dir().map(|home| home.join(".config"));
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
            primary_token: None,
            ide_config_dir: config_home.as_ref().map(|c| c.join("github-copilot")),
            gh_hosts_path: gh_hosts_path(),
            use_keychain: true,
            use_browser_session: true,
        }
    }
}

impl CopilotConfig {
    /// Default configuration with the primary token read from the
    /// environment.
    pub fn from_env() -> Self {
        Self {
            primary_token: token_from_env(),
            ..Self::default()
        }
    }

    /// A configuration that touches nothing on the host; every channel is
    /// off until enabled.
    pub fn isolated(api_base: impl Into<String>, web_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            web_base: web_base.into(),
            primary_token: None,
            ide_config_dir: None,
            gh_hosts_path: None,
            use_keychain: false,
            use_browser_session: false,
        }
    }

    /// Hosts of the API and web base URLs; the provider's HTTP client
    /// refuses every other host.
    pub fn allowed_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = [&self.api_base, &self.web_base]
            .into_iter()
            .filter_map(|base| reqwest::Url::parse(base).ok())
            .filter_map(|url| url.host_str().map(str::to_string))
            .collect();
        hosts.dedup();
        hosts
    }

    /// Sets the primary token.
    #[must_use]
    pub fn with_primary_token(mut self, token: impl Into<String>) -> Self {
        self.primary_token = Some(("config".to_string(), token.into()));
        self
    }

    /// Sets the IDE config directory.
    #[must_use]
    pub fn with_ide_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ide_config_dir = Some(dir.into());
        self
    }

    /// Sets the gh CLI hosts file.
    #[must_use]
    pub fn with_gh_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.gh_hosts_path = Some(path.into());
        self
    }
}

/// Reads the primary token, returning the variable name with it.
fn token_from_env() -> Option<(String, String)> {
    [COPILOT_TOKEN_ENV, GITHUB_TOKEN_ENV]
        .iter()
        .find_map(|var| {
            std::env::var(var)
                .ok()
                .filter(|t| !t.trim().is_empty())
                .map(|t| ((*var).to_string(), t.trim().to_string()))
        })
}

/// Locates the gh CLI hosts file, preferring the XDG config dir.
fn gh_hosts_path() -> Option<PathBuf> {
    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("gh").join("hosts.yml");
        if path.exists() {
            return Some(path);
        }
    }
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("gh").join("hosts.yml"))
}
