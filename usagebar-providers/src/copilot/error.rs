//! Copilot-specific errors.

use thiserror::Error;
use usagebar_core::ProviderError;

/// Copilot-specific errors.
#[derive(Debug, Error)]
pub enum CopilotError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Token was rejected.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid response from API.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limited by API.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Copilot not enabled for user.
    #[error("Copilot not enabled for this account")]
    NotEnabled,
}

impl From<reqwest::Error> for CopilotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CopilotError::HttpError(format!("Request timed out: {err}"))
        } else if err.is_connect() {
            CopilotError::HttpError(format!("Connection failed: {err}"))
        } else {
            CopilotError::HttpError(err.to_string())
        }
    }
}

impl From<usagebar_fetch::HttpError> for CopilotError {
    fn from(err: usagebar_fetch::HttpError) -> Self {
        match err {
            usagebar_fetch::HttpError::Request(e) => e.into(),
            other => CopilotError::HttpError(other.to_string()),
        }
    }
}

impl From<CopilotError> for ProviderError {
    fn from(err: CopilotError) -> Self {
        match err {
            CopilotError::HttpError(msg) => ProviderError::Network(msg),
            CopilotError::AuthenticationFailed(msg) => ProviderError::AuthenticationFailed(msg),
            CopilotError::InvalidResponse(msg) => ProviderError::Decoding(msg),
            CopilotError::RateLimited(msg) => {
                ProviderError::Provider(format!("rate limited: {msg}"))
            }
            CopilotError::NotEnabled => {
                ProviderError::Provider("Copilot not enabled for this account".to_string())
            }
        }
    }
}
