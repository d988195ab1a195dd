//! HTTP client with tracing and a browser-like identity.
//!
//! Session endpoints reject obvious bots, so every request carries the
//! configured user agent.

use reqwest::{Client, Response, header::HeaderMap};
use tracing::{debug, instrument};
use url::Url;

use crate::context::FetchSettings;
use crate::error::HttpError;

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and an optional domain allowlist.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpClient {
    /// Creates a client from fetch settings.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Build`] when the TLS backend cannot be set up.
    pub fn new(settings: &FetchSettings) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .timeout(settings.http_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self {
            inner,
            allowed_domains: None,
        })
    }

    /// Restricts requests to the given domains and their subdomains.
    #[must_use]
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &str) -> Result<(), HttpError> {
        let Some(ref allowed) = self.allowed_domains else {
            return Ok(());
        };

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(HttpError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Performs a GET request with custom headers.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("GET request with headers");

        let response = self.inner.get(url).headers(headers).send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpClient {
        HttpClient::new(&FetchSettings::default()).unwrap()
    }

    #[test]
    fn test_no_allowlist_allows_everything() {
        assert!(client().is_domain_allowed("https://example.com/x").is_ok());
    }

    #[test]
    fn test_allowlist_matches_subdomains() {
        let client = client().with_allowed_domains(vec!["github.com".into()]);
        assert!(client.is_domain_allowed("https://github.com/settings").is_ok());
        assert!(client.is_domain_allowed("https://api.github.com/user").is_ok());
        assert!(matches!(
            client.is_domain_allowed("https://notgithub.com/"),
            Err(HttpError::DomainNotAllowed(_))
        ));
        assert!(matches!(
            client.is_domain_allowed("not a url"),
            Err(HttpError::InvalidUrl(_))
        ));
    }
}
