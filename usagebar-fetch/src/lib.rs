// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `UsageBar` Fetch
//!
//! Fetch orchestration, host APIs and decoders for `UsageBar`.
//!
//! ## Orchestration
//!
//! - [`orchestrator::FetchOrchestrator`] - Runs every provider concurrently
//!   under a per-provider timeout and collects a snapshot
//! - [`context::FetchContext`] - Host APIs handed to providers
//!
//! ## Host APIs
//!
//! - [`host::keychain`] - Platform secret store
//! - [`host::http`] - HTTP client with tracing
//! - [`host::browser`] - Browser cookie import and decryption
//!
//! ## Decoders
//!
//! - [`wire`] - Structural decoder for length-delimited binary caches
//! - [`coerce`] - Lenient JSON field access
//!
//! ## Example
//!
//! ```ignore
//! use usagebar_fetch::{FetchOrchestrator, FetchSettings};
//!
//! let orchestrator = FetchOrchestrator::new(providers, FetchSettings::default());
//! let snapshot = orchestrator.fetch_all().await;
//! ```

pub mod coerce;
pub mod context;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod wire;

// Errors
pub use error::{BrowserError, HttpError, KeychainError, WireError};

// Host APIs
pub use host::{
    Browser, BrowserCookieImporter, BrowserProfile, CookieJar, DecryptedCookie, HttpClient,
    MemorySecretStore, ProfileStatus, SecretStore, SystemSecretStore,
};

// Orchestration
pub use context::{FetchContext, FetchContextBuilder, FetchSettings};
pub use orchestrator::{FetchOrchestrator, Snapshot};

// Decoders
pub use wire::{WireMessage, WireValue, WireWriter};
