//! Dictionary HTTP client implementation

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{DictClientError, Result};
use crate::types::{ErrorResponse, LookupRequest};

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a remote dictionary server
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct DictClient {
    client: Client,
    base_url: Url,
}

impl DictClient {
    /// Create a new dictionary client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the dictionary server (e.g., "http://localhost:1323")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new dictionary client with custom timeouts
    pub fn with_config(base_url: &str, timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        Self::from_url(Url::parse(base_url)?, timeout, connect_timeout, None)
    }

    /// Create a new dictionary client from an already parsed URL
    ///
    /// With `proxy` set, every request goes through that HTTP proxy and the
    /// proxy environment variables are ignored.
    pub fn from_url(
        base_url: Url,
        timeout: Duration,
        connect_timeout: Duration,
        proxy: Option<&Url>,
    ) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout);
        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: normalize_base(base_url),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a route relative to the base URL, keeping any path prefix
    fn endpoint(&self, route: &str) -> Result<Url> {
        Ok(self.base_url.join(route.trim_start_matches('/'))?)
    }

    // =========================================================================
    // Health Check
    // =========================================================================

    /// Check server health
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn health(&self) -> Result<String> {
        let url = self.endpoint("/health")?;
        let response = self.client.get(url).send().await?;

        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Fetch dictionary documents for several CVE IDs at once
    #[instrument(skip(self, cve_ids), fields(base_url = %self.base_url, count = cve_ids.len()))]
    pub async fn lookup(&self, cve_ids: &[String]) -> Result<HashMap<String, serde_json::Value>> {
        let url = self.endpoint("/cves")?;
        debug!("Looking up {} CVEs at {}", cve_ids.len(), url);

        let body = LookupRequest {
            cve_ids: cve_ids.to_vec(),
        };
        let response = self.client.post(url).json(&body).send().await?;
        self.handle_response(response).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Handle response and parse JSON
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| DictClientError::ParseError(e.to_string()))
        } else {
            Err(self.extract_error_from_status(response, status).await)
        }
    }

    /// Extract error from failed response
    async fn extract_error(&self, response: reqwest::Response) -> DictClientError {
        let status = response.status();
        self.extract_error_from_status(response, status).await
    }

    async fn extract_error_from_status(
        &self,
        response: reqwest::Response,
        status: StatusCode,
    ) -> DictClientError {
        let message = match response.json::<ErrorResponse>().await {
            Ok(err) if !err.message.is_empty() => err.message,
            Ok(err) if !err.error.is_empty() => err.error,
            _ => format!("HTTP {}", status),
        };

        match status {
            StatusCode::REQUEST_TIMEOUT => DictClientError::Timeout,
            _ => DictClientError::server_error(status.as_u16(), message),
        }
    }
}

/// Make sure the base path ends with a slash so `join` appends to it
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
