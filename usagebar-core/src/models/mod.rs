//! Domain models for `UsageBar`.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider identifiers
//! - [`usage`] - Usage values, details, quota records, history
//! - [`result`] - Reconciled provider and account results

mod provider;
mod result;
mod usage;

pub use provider::ProviderKind;
pub use result::{AccountResult, ProviderResult};
pub use usage::{DailyUsage, ModelUsage, QuotaRecord, Usage, UsageDetails};
#[cfg(test)]
mod serde_tests;
