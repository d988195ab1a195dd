// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `UsageBar` Providers
//!
//! Provider implementations for the `UsageBar` aggregation core.
//!
//! Each provider gathers candidates from its credential channels and
//! reconciles them into one [`usagebar_core::ProviderResult`].
//!
//! ## Supported Providers
//!
//! | Provider | Token | Keychain | IDE config | Browser session | Local cache |
//! |----------|-------|----------|------------|-----------------|-------------|
//! | Copilot (GitHub) | ✅ | ✅ | ✅ | ✅ | ❌ |
//! | Antigravity | ❌ | ❌ | ❌ | ❌ | ✅ |
//!
//! ## Usage
//!
//! ```ignore
//! use usagebar_fetch::{FetchContext, FetchOrchestrator, FetchSettings};
//! use usagebar_providers::default_providers;
//!
//! let settings = FetchSettings::default();
//! let ctx = FetchContext::new(settings.clone())?;
//! let orchestrator = FetchOrchestrator::new(default_providers(&ctx), settings);
//! let snapshot = orchestrator.fetch_all().await;
//! ```

pub mod registry;

// Provider modules (alphabetical)
pub mod antigravity;
pub mod copilot;

pub use registry::{ProviderRegistry, default_providers};

pub use antigravity::{AntigravityConfig, AntigravityProvider};
pub use copilot::{CopilotConfig, CopilotProvider, CustomerIdCache};
