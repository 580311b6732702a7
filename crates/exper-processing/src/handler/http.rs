//! HTTP transport backed by a blocking `reqwest` client.

use super::fetcher::ResourceFetcher;
use crate::error::{ProcessingError, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpFetcherConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Value sent in the `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: concat!("exper/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Fetches resources over HTTP(S).
///
/// # Example
///
/// ```rust,ignore
/// use exper_processing::handler::{ApiHandler, HttpFetcher};
///
/// let handler = ApiHandler::new(HttpFetcher::new()?, "median_house_value");
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_config(HttpFetcherConfig::default())
    }

    /// Create a fetcher with custom configuration.
    pub fn with_config(config: HttpFetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self { client })
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "Sending GET request");
        let unavailable = |reason: String| ProcessingError::DataUnavailable {
            location: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP status {}", response.status())));
        }

        let body = response.bytes().map_err(|e| unavailable(e.to_string()))?;
        debug!(url, bytes = body.len(), "Response received");
        Ok(body.to_vec())
    }

    fn name(&self) -> &str {
        "http"
    }
}
