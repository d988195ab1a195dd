//! Fetch error types.

use thiserror::Error;
use usagebar_core::ProviderError;

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

impl From<HttpError> for ProviderError {
    fn from(err: HttpError) -> Self {
        ProviderError::Network(err.to_string())
    }
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for secret store operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Access denied.
    #[error("Access denied to keychain")]
    AccessDenied,

    /// Platform error.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Generic error.
    #[error("Keychain error: {0}")]
    Other(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::Ambiguous(_) => {
                KeychainError::Other("Ambiguous credential entry".to_string())
            }
            keyring::Error::PlatformFailure(e) => KeychainError::Platform(e.to_string()),
            keyring::Error::NoStorageAccess(_) => KeychainError::AccessDenied,
            _ => KeychainError::Other(err.to_string()),
        }
    }
}

impl From<KeychainError> for ProviderError {
    fn from(err: KeychainError) -> Self {
        ProviderError::AuthenticationFailed(err.to_string())
    }
}

// ============================================================================
// Browser Error
// ============================================================================

/// Error type for browser cookie operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to read cookies.
    #[error("Failed to read cookies: {0}")]
    ReadFailed(String),

    /// Cookie decryption failed.
    #[error("Cookie decryption failed: {0}")]
    DecryptionFailed(String),

    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BrowserError> for ProviderError {
    fn from(err: BrowserError) -> Self {
        ProviderError::AuthenticationFailed(err.to_string())
    }
}

// ============================================================================
// Wire Error
// ============================================================================

/// Error type for length-delimited binary decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Input ended in the middle of a tag or value.
    #[error("Truncated input at offset {0}")]
    Truncated(usize),

    /// A varint ran past ten bytes.
    #[error("Varint overflow at offset {0}")]
    VarintOverflow(usize),

    /// Wire type outside {0, 1, 2, 5}.
    #[error("Unknown wire type {wire_type} for field {field} at offset {offset}")]
    UnknownWireType {
        /// Wire type from the tag.
        wire_type: u8,
        /// Field number from the tag.
        field: u64,
        /// Byte offset of the tag.
        offset: usize,
    },
}

impl From<WireError> for ProviderError {
    fn from(err: WireError) -> Self {
        ProviderError::Decoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_error_maps_to_decoding() {
        let err: ProviderError = WireError::Truncated(4).into();
        assert_eq!(err.category(), "decoding");
    }

    #[test]
    fn test_keychain_error_maps_to_auth() {
        let err: ProviderError = KeychainError::AccessDenied.into();
        assert_eq!(err.category(), "authentication_failed");
    }
}
