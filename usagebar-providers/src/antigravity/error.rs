//! Antigravity-specific errors.

use thiserror::Error;
use usagebar_core::ProviderError;
use usagebar_fetch::WireError;

/// Antigravity-specific errors.
#[derive(Debug, Error)]
pub enum AntigravityError {
    /// The local state database does not exist.
    #[error("Antigravity state database not found: {0}")]
    NotInstalled(String),

    /// The state database could not be read.
    #[error("State database error: {0}")]
    Database(String),

    /// No signed-in auth status row.
    #[error("Antigravity is not signed in")]
    NotSignedIn,

    /// The auth status value is malformed.
    #[error("Invalid auth status: {0}")]
    InvalidResponse(String),

    /// The cached user status blob is malformed.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The cache carries no model quotas.
    #[error("No quota data in the local cache")]
    NoData,
}

impl From<rusqlite::Error> for AntigravityError {
    fn from(err: rusqlite::Error) -> Self {
        AntigravityError::Database(err.to_string())
    }
}

impl From<std::io::Error> for AntigravityError {
    fn from(err: std::io::Error) -> Self {
        AntigravityError::Database(err.to_string())
    }
}

impl From<AntigravityError> for ProviderError {
    fn from(err: AntigravityError) -> Self {
        match err {
            AntigravityError::NotInstalled(_) | AntigravityError::NotSignedIn => {
                ProviderError::AuthenticationFailed(err.to_string())
            }
            AntigravityError::Database(msg) => ProviderError::Provider(msg),
            AntigravityError::InvalidResponse(msg) => ProviderError::Decoding(msg),
            AntigravityError::Wire(e) => e.into(),
            AntigravityError::NoData => ProviderError::Provider(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_mapping() {
        let e: ProviderError = AntigravityError::NotSignedIn.into();
        assert_eq!(e.category(), "authentication_failed");
        let e: ProviderError = AntigravityError::Wire(WireError::Truncated(4)).into();
        assert_eq!(e.category(), "decoding");
        let e: ProviderError = AntigravityError::NoData.into();
        assert_eq!(e.category(), "provider");
    }
}
