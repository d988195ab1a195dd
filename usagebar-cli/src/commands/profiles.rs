//! Profiles command - list browser profiles and their session state.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use usagebar_fetch::{BrowserCookieImporter, ProfileStatus, SecretStore, SystemSecretStore};

use crate::{Cli, ExitCode, OutputFormat};

/// Default cookie domain to inspect.
const DEFAULT_DOMAIN: &str = "github.com";

/// Arguments for the profiles command.
#[derive(Args)]
pub struct ProfilesArgs {
    /// Cookie domain to inspect.
    #[arg(long, default_value = DEFAULT_DOMAIN)]
    pub domain: String,
}

/// Runs the profiles command.
pub async fn run(args: &ProfilesArgs, cli: &Cli) -> Result<ExitCode> {
    let secrets: Arc<dyn SecretStore> = Arc::new(SystemSecretStore::new());
    let importer = BrowserCookieImporter::new(secrets);
    let domain = args.domain.clone();

    let profiles = tokio::task::spawn_blocking(move || importer.list_profiles(&domain))
        .await
        .context("Profile scan failed")?;

    match cli.format {
        OutputFormat::Text => {
            if profiles.is_empty() {
                println!("No browser profiles found");
            }
            for status in &profiles {
                println!("{}", format_line(status));
            }
        }
        OutputFormat::Json => {
            let output = if cli.pretty {
                serde_json::to_string_pretty(&profiles)?
            } else {
                serde_json::to_string(&profiles)?
            };
            println!("{output}");
        }
    }

    Ok(ExitCode::Success)
}

fn format_line(status: &ProfileStatus) -> String {
    let state = match (&status.login, status.logged_in) {
        (Some(login), true) => format!("logged in as {login}"),
        (None, true) => "logged in".to_string(),
        (_, false) => "not logged in".to_string(),
    };
    format!(
        "{:<28} {:>4} cookies  {}",
        status.profile.display_name, status.cookie_count, state
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use usagebar_fetch::{Browser, BrowserProfile};

    #[test]
    fn test_format_line() {
        let status = ProfileStatus {
            profile: BrowserProfile {
                browser: Browser::Chrome,
                path: PathBuf::from("/tmp/Default"),
                display_name: "Chrome - Default".into(),
            },
            cookie_count: 12,
            logged_in: true,
            login: Some("alice".into()),
        };
        let line = format_line(&status);
        assert!(line.starts_with("Chrome - Default"));
        assert!(line.ends_with("logged in as alice"));
    }
}
