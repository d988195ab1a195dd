//! Core error types for `UsageBar`.

use thiserror::Error;

/// Error taxonomy shared by every provider.
///
/// Provider-specific errors convert into one of these variants before they
/// reach the orchestrator, which logs them and drops the provider from the
/// snapshot.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No usable credential produced data from any channel.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Transport failure or explicit timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed JSON or unrecognized binary wire data.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Provider-specific semantic failure.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Operation not implemented by this provider.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Short machine-friendly name of the variant, used in log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::Network(_) => "network",
            Self::Decoding(_) => "decoding",
            Self::Provider(_) => "provider",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category() {
        assert_eq!(
            ProviderError::AuthenticationFailed("x".into()).category(),
            "authentication_failed"
        );
        assert_eq!(ProviderError::Network("x".into()).category(), "network");
        assert_eq!(ProviderError::Unsupported("x".into()).category(), "unsupported");
    }

    #[test]
    fn test_from_json_error_is_decoding() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ProviderError = err.into();
        assert!(matches!(err, ProviderError::Decoding(_)));
    }
}
