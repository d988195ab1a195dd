//! Builds reconciliation candidates from the Copilot channels.

use tracing::debug;
use usagebar_core::{AccountCandidate, SourcePriority, Usage, UsageDetails};

use super::session::SessionUsage;

/// Converts session usage to a candidate on its own.
///
/// Without a token to inherit from, overage is inferred from whether any
/// add-on cost has been billed.
pub fn session_candidate(session: SessionUsage) -> AccountCandidate {
    let priority = SourcePriority::BrowserSession;
    let usage = Usage::quota(
        session.card.remaining(),
        session.card.entitlement,
        session.card.net_billed_amount > 0.0,
    );
    let details = UsageDetails {
        login: session.login.clone(),
        channel: Some(priority.channel_name().to_string()),
        history: session.history,
        ..Default::default()
    };

    let candidate = AccountCandidate::new(usage, priority).with_details(details);
    match session.login {
        Some(login) => candidate.with_account_id(login),
        None => candidate,
    }
}

/// Merges a session with the token candidate for the same login.
///
/// Usage numbers come from the session; plan, overage permission and reset
/// date come from the token.
fn merge(token: AccountCandidate, session: SessionUsage) -> AccountCandidate {
    let overage_permitted = match token.usage {
        Usage::QuotaBased {
            overage_permitted, ..
        } => overage_permitted,
        Usage::PayAsYouGo { .. } => session.card.net_billed_amount > 0.0,
    };
    let priority = SourcePriority::BrowserSession.max_rank(token.source_priority);

    let details = UsageDetails {
        login: token.details.login.or(session.login),
        plan: token.details.plan,
        resets_at: token.details.resets_at,
        channel: Some(priority.channel_name().to_string()),
        history: session.history,
        ..Default::default()
    };

    let candidate = AccountCandidate::new(
        Usage::quota(
            session.card.remaining(),
            session.card.entitlement,
            overage_permitted,
        ),
        priority,
    )
    .with_details(details);

    match token.account_id {
        Some(id) => candidate.with_account_id(id),
        None => candidate,
    }
}

/// Combines token candidates with an optional session into one pool.
///
/// The session pairs with the first token candidate whose login matches
/// ignoring case; the pair is replaced by the merged candidate. Everything
/// unmatched is kept unchanged.
pub fn build_candidates(
    mut tokens: Vec<AccountCandidate>,
    session: Option<SessionUsage>,
) -> Vec<AccountCandidate> {
    let Some(session) = session else {
        return tokens;
    };

    let matched = session
        .login
        .as_deref()
        .and_then(|login| tokens.iter().position(|c| c.matches_login(login)));

    match matched {
        Some(index) => {
            let token = tokens.remove(index);
            debug!(
                token_channel = token.source_priority.channel_name(),
                "Merging browser session with token account"
            );
            tokens.push(merge(token, session));
        }
        None => {
            debug!("Browser session has no matching token account");
            tokens.push(session_candidate(session));
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copilot::parser::UsageCard;
    use usagebar_core::reconcile;

    fn token(login: &str, remaining: i64, priority: SourcePriority) -> AccountCandidate {
        AccountCandidate::new(Usage::quota(remaining, 1000, true), priority)
            .with_account_id(login)
            .with_details(UsageDetails {
                login: Some(login.to_string()),
                plan: Some("individual_pro".to_string()),
                channel: Some(priority.channel_name().to_string()),
                ..Default::default()
            })
    }

    fn session(login: Option<&str>, used: f64) -> SessionUsage {
        SessionUsage {
            login: login.map(str::to_string),
            card: UsageCard {
                net_quantity: 0.0,
                discount_quantity: used,
                entitlement: 1000,
                net_billed_amount: 0.0,
            },
            history: Vec::new(),
        }
    }

    #[test]
    fn test_alice_merge_end_to_end() {
        let tokens = vec![token("alice", 350, SourcePriority::NativeKeychain)];
        let pool = build_candidates(tokens, Some(session(Some("Alice"), 700.0)));
        assert_eq!(pool.len(), 1);

        let result = reconcile(pool, &["native_keychain", "browser_session"]).unwrap();
        assert_eq!(result.usage.used(), Some(700));
        assert_eq!(result.usage.entitlement(), Some(1000));
        assert_eq!(result.usage, Usage::quota(300, 1000, true));

        let details = result.details.unwrap();
        assert_eq!(details.login.as_deref(), Some("alice"));
        assert_eq!(details.plan.as_deref(), Some("individual_pro"));
        assert_eq!(details.channel.as_deref(), Some("browser_session"));
        assert_eq!(result.accounts.len(), 1);
    }

    #[test]
    fn test_unmatched_session_is_kept() {
        let tokens = vec![token("bob", 900, SourcePriority::IdeConfig)];
        let pool = build_candidates(tokens, Some(session(Some("alice"), 100.0)));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[1].source_priority, SourcePriority::BrowserSession);
        assert!(!matches!(
            pool[1].usage,
            Usage::QuotaBased {
                overage_permitted: true,
                ..
            }
        ));
    }

    #[test]
    fn test_anonymous_session_does_not_merge() {
        let tokens = vec![token("alice", 350, SourcePriority::OtherConfig)];
        let pool = build_candidates(tokens, Some(session(None, 100.0)));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[1].account_id, None);
    }

    #[test]
    fn test_no_session_passes_tokens_through() {
        let tokens = vec![token("alice", 350, SourcePriority::PrimaryToken)];
        assert_eq!(build_candidates(tokens.clone(), None), tokens);
    }

    #[test]
    fn test_session_only_overage_from_billed_amount() {
        let mut s = session(Some("carol"), 1010.0);
        s.card.net_billed_amount = 0.4;
        let candidate = session_candidate(s);
        assert_eq!(candidate.usage, Usage::quota(-10, 1000, true));
    }
}
