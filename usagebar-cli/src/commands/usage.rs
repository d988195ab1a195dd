//! Usage command - fetch and display provider usage.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use usagebar_core::{ProviderKind, ProviderResult, Usage};
use usagebar_fetch::{FetchContext, FetchOrchestrator, FetchSettings, Snapshot};
use usagebar_providers::ProviderRegistry;
use tracing::info;

use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the usage command.
#[derive(Args, Default)]
pub struct UsageArgs {
    /// Provider to query (or "all"). Can be comma-separated.
    #[arg(long, short)]
    pub provider: Option<String>,

    /// Per-provider timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Runs the usage command.
pub async fn run(args: &UsageArgs, cli: &Cli) -> Result<ExitCode> {
    let providers = parse_provider_selection(args.provider.as_deref())?;
    info!(providers = ?providers, "Fetching usage");

    let mut settings = FetchSettings::default();
    if let Some(secs) = args.timeout {
        settings = settings.with_provider_timeout(Duration::from_secs(secs));
    }
    let ctx = FetchContext::new(settings.clone()).context("Failed to set up HTTP client")?;

    let orchestrator =
        FetchOrchestrator::new(ProviderRegistry::build_many(&providers, &ctx), settings);
    let snapshot = orchestrator.fetch_all().await;

    match cli.format {
        OutputFormat::Text => {
            for kind in &providers {
                println!("{}", format_text(*kind, snapshot.get(kind)));
            }
        }
        OutputFormat::Json => println!("{}", format_json(&snapshot, cli.pretty)?),
    }

    if snapshot.is_empty() {
        Ok(ExitCode::ProviderMissing)
    } else {
        Ok(ExitCode::Success)
    }
}

/// Parses provider selection from argument.
fn parse_provider_selection(arg: Option<&str>) -> Result<Vec<ProviderKind>> {
    match arg.map(str::trim) {
        None | Some("all" | "") => Ok(ProviderKind::all().to_vec()),
        Some(names) => {
            let mut providers = Vec::new();
            for name in names.split(',') {
                let Some(kind) = ProviderRegistry::kind_by_cli_name(name) else {
                    anyhow::bail!("Unknown provider: {}", name.trim());
                };
                if !providers.contains(&kind) {
                    providers.push(kind);
                }
            }
            Ok(providers)
        }
    }
}

/// Serializes the snapshot with providers in a stable order.
fn format_json(snapshot: &Snapshot, pretty: bool) -> Result<String> {
    let ordered: BTreeMap<&ProviderKind, &ProviderResult> = snapshot.iter().collect();
    let output = if pretty {
        serde_json::to_string_pretty(&ordered)?
    } else {
        serde_json::to_string(&ordered)?
    };
    Ok(output)
}

fn describe(usage: &Usage) -> String {
    match usage {
        Usage::QuotaBased {
            remaining,
            entitlement,
            overage_permitted,
        } => {
            let used = entitlement - remaining;
            let percent = usage
                .used_percent()
                .map(|p| format!(" ({p:.0}%)"))
                .unwrap_or_default();
            let overage = if *remaining < 0 && *overage_permitted {
                ", billing overage"
            } else {
                ""
            };
            format!("{used}/{entitlement} used{percent}, {remaining} left{overage}")
        }
        Usage::PayAsYouGo { cost: Some(cost), .. } => format!("${cost:.2} this period"),
        Usage::PayAsYouGo { .. } => "unlimited".to_string(),
    }
}

/// Renders one provider as text.
fn format_text(kind: ProviderKind, result: Option<&ProviderResult>) -> String {
    let Some(result) = result else {
        return format!("{:<13} unavailable", kind.display_name());
    };

    let mut out = format!("{:<13} {}", kind.display_name(), describe(&result.usage));
    if let Some(details) = &result.details {
        if let Some(plan) = &details.plan {
            out.push_str(&format!(" [{plan}]"));
        }
        for model in &details.models {
            out.push_str(&format!(
                "\n  {:<30} {:>5.1}% left",
                model.label,
                model.remaining_percent()
            ));
        }
    }
    if result.has_multiple_accounts() {
        for account in &result.accounts {
            out.push_str(&format!("\n  {:<30} {}", account.label(), describe(&account.usage)));
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use usagebar_core::{AccountResult, QuotaRecord, UsageDetails};

    #[test]
    fn test_parse_provider_default() {
        assert_eq!(
            parse_provider_selection(None).unwrap(),
            ProviderKind::all().to_vec()
        );
        assert_eq!(
            parse_provider_selection(Some("all")).unwrap(),
            ProviderKind::all().to_vec()
        );
    }

    #[test]
    fn test_parse_provider_comma_separated() {
        let providers = parse_provider_selection(Some("github, antigravity,copilot")).unwrap();
        assert_eq!(
            providers,
            vec![ProviderKind::Copilot, ProviderKind::Antigravity]
        );
    }

    #[test]
    fn test_parse_provider_unknown() {
        assert!(parse_provider_selection(Some("codex")).is_err());
    }

    #[test]
    fn test_format_text_quota() {
        let result = ProviderResult::single(Usage::quota(300, 1000, false), None);
        let text = format_text(ProviderKind::Copilot, Some(&result));
        assert!(text.contains("700/1000 used (70%)"));
        assert!(text.contains("300 left"));
    }

    #[test]
    fn test_format_text_accounts_and_models() {
        let result = ProviderResult {
            usage: Usage::quota(-5, 300, true),
            details: Some(UsageDetails {
                models: vec![QuotaRecord::new("Claude", 0.5)],
                ..Default::default()
            }),
            accounts: vec![
                AccountResult {
                    index: 0,
                    account_id: Some("alice".into()),
                    usage: Usage::quota(-5, 300, true),
                    details: None,
                },
                AccountResult {
                    index: 1,
                    account_id: None,
                    usage: Usage::quota(100, 300, false),
                    details: None,
                },
            ],
        };
        let text = format_text(ProviderKind::Copilot, Some(&result));
        assert!(text.contains("billing overage"));
        assert!(text.contains("Claude"));
        assert!(text.contains("alice"));
        assert!(text.contains("#2"));
    }

    #[test]
    fn test_format_text_missing() {
        assert!(format_text(ProviderKind::Antigravity, None).contains("unavailable"));
    }

    #[test]
    fn test_format_json_is_keyed_by_provider() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            ProviderKind::Copilot,
            ProviderResult::single(Usage::quota(1, 2, false), None),
        );
        let json = format_json(&snapshot, false).unwrap();
        assert!(json.starts_with(r#"{"copilot":"#));
        assert!(json.contains(r#""kind":"quota_based""#));
    }
}
