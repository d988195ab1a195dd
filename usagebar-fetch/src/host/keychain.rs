//! Platform secret store access.
//!
//! Two consumers read from here: the cookie decryptor (browser "Safe
//! Storage" master passwords) and the Copilot keychain channel (stored
//! GitHub tokens). Both go through the [`SecretStore`] trait so tests can
//! substitute [`MemorySecretStore`].
//!
//! [`SystemSecretStore`] holds no state: every call reads the platform
//! store, so entries added between cycles are seen on the next cycle.

use std::collections::HashMap;

use keyring::Entry;
use tracing::{trace, warn};

use crate::error::KeychainError;

// ============================================================================
// Secret Store Trait
// ============================================================================

/// Read-only access to a platform secret store.
///
/// Lookups are blocking; async callers run them on
/// `tokio::task::spawn_blocking`.
pub trait SecretStore: Send + Sync {
    /// Reads a secret.
    ///
    /// # Returns
    /// * `Ok(Some(secret))` - Entry found and non-empty
    /// * `Ok(None)` - No entry
    /// * `Err(e)` - The store itself failed
    ///
    /// # Errors
    ///
    /// Returns a [`KeychainError`] when the store cannot be reached.
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError>;
}

// ============================================================================
// System Secret Store
// ============================================================================

/// Secret store backed by the `keyring` crate.
///
/// - macOS: Keychain Services
/// - Linux: Secret Service (GNOME Keyring, KDE Wallet)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSecretStore;

impl SystemSecretStore {
    /// Creates a new system secret store.
    pub fn new() -> Self {
        Self
    }

    fn read(service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        let entry = Entry::new(service, account)?;
        match entry.get_password() {
            Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl SecretStore for SystemSecretStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        trace!(service = %service, account = %account, "Secret store lookup");
        Self::read(service, account).inspect_err(|e| {
            warn!(
                service = %service,
                account = %account,
                error = %e,
                "Failed to read secret store"
            );
        })
    }
}

// ============================================================================
// In-Memory Secret Store
// ============================================================================

/// Fixed set of secrets, for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    entries: HashMap<(String, String), String>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    #[must_use]
    pub fn with(mut self, service: &str, account: &str, secret: &str) -> Self {
        self.entries
            .insert((service.to_string(), account.to_string()), secret.to_string());
        self
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        Ok(self
            .entries
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lookup() {
        let store = MemorySecretStore::new().with("Chrome Safe Storage", "Chrome", "pw");
        assert_eq!(
            store.get("Chrome Safe Storage", "Chrome").unwrap().as_deref(),
            Some("pw")
        );
        assert!(store.get("Chrome Safe Storage", "Brave").unwrap().is_none());
    }

    #[test]
    fn test_system_store_rereads_after_miss() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let store = SystemSecretStore::new();

        assert!(store.get("usagebar-test", "missing").unwrap().is_none());
        // A second lookup goes back to the platform store rather than a
        // remembered miss; the stateless store has nowhere to keep one.
        assert_eq!(std::mem::size_of::<SystemSecretStore>(), 0);
        assert!(store.get("usagebar-test", "missing").unwrap().is_none());
    }
}
