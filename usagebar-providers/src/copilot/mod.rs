//! Copilot (GitHub) provider implementation.
//!
//! Premium-request usage is collected from two kinds of channel:
//!
//! - **Token channels**: the primary token (`COPILOT_API_TOKEN`,
//!   `GITHUB_TOKEN`), the OS keychain, the IDE plugin config and the gh CLI
//!   hosts file. Each token is exchanged at `/copilot_internal/user`.
//! - **Browser session**: the first logged-in browser profile's cookies
//!   drive the billing usage card and the daily usage table.
//!
//! A session is merged into the token account with the same login; every
//! other account is kept and the result is reconciled by
//! [`usagebar_core::reconcile()`].
//!
//! ## Example
//!
//! ```ignore
//! use usagebar_providers::copilot::{CopilotConfig, CopilotProvider};
//!
//! let provider = CopilotProvider::new(&ctx, CopilotConfig::from_env());
//! let result = provider.fetch().await?;
//! ```

// Modules
mod api;
mod candidates;
mod config;
mod error;
pub(crate) mod parser;
mod provider;
mod session;
mod token_store;

// Re-exports
pub use api::{CopilotApiClient, TokenUsage};
pub use candidates::{build_candidates, session_candidate};
pub use config::{
    COPILOT_TOKEN_ENV, CopilotConfig, DEFAULT_API_BASE, DEFAULT_WEB_BASE, GITHUB_TOKEN_ENV,
};
pub use error::CopilotError;
pub use parser::UsageCard;
pub use provider::CopilotProvider;
pub use session::{CopilotSessionClient, CustomerIdCache, SessionUsage};
pub use token_store::{CopilotTokenStore, TokenSource};
