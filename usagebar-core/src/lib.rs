// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `UsageBar` Core
//!
//! Core types, models, and traits for the `UsageBar` aggregation core.
//!
//! This crate provides the foundational abstractions used across all other
//! `UsageBar` crates, including:
//!
//! - Domain models (usage values, per-account results, quota records)
//! - The provider error taxonomy
//! - The [`UsageProvider`] contract every provider implements
//! - Account reconciliation (dedup, priority merge, worst-case aggregate)
//!
//! ## Key Types
//!
//! ### Usage Types
//! - [`Usage`] - Pay-as-you-go or quota-based usage value
//! - [`UsageDetails`] - Metadata that travels next to a usage value
//! - [`QuotaRecord`] - Remaining fraction for one labelled quota
//! - [`DailyUsage`] - One row of recovered daily history
//!
//! ### Results
//! - [`ProviderResult`] - The reconciled record for one provider
//! - [`AccountResult`] - One distinct account inside a provider result
//!
//! ### Reconciliation
//! - [`AccountCandidate`] - Provisional record from one credential channel
//! - [`SourcePriority`] - Total order over credential channels
//! - [`reconcile()`] - Dedup + aggregate into a [`ProviderResult`]

pub mod error;
pub mod models;
pub mod reconcile;
pub mod traits;

// Re-export error types
pub use error::ProviderError;

// Re-export all model types
pub use models::{
    // Provider types
    ProviderKind,
    // Usage types
    DailyUsage,
    ModelUsage,
    QuotaRecord,
    Usage,
    UsageDetails,
    // Results
    AccountResult,
    ProviderResult,
};

// Reconciliation
pub use reconcile::{AccountCandidate, SourcePriority, aggregate_usage, dedup, reconcile};

// Re-export traits
pub use traits::UsageProvider;
