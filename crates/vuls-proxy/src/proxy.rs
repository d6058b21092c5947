//! RemoteDictionary - DictionaryClient that proxies to a remote dictionary server

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;
use vuls_client::{DictClient, DictClientError};
use vuls_core::{BackendError, BackendResult, DictionaryClient, DictionaryKind};

/// A `DictionaryClient` that forwards every lookup to a dictionary server.
///
/// The underlying HTTP client keeps a connection pool that is shared by all
/// concurrent requests and closed when this value is dropped.
pub struct RemoteDictionary {
    kind: DictionaryKind,
    client: DictClient,
}

impl RemoteDictionary {
    /// Create a remote backend. Does not perform any network I/O.
    pub fn new(
        kind: DictionaryKind,
        endpoint: Url,
        timeout: Duration,
        connect_timeout: Duration,
        http_proxy: Option<&Url>,
    ) -> BackendResult<Self> {
        let client = DictClient::from_url(endpoint, timeout, connect_timeout, http_proxy)
            .map_err(Self::map_err)?;
        tracing::info!(kind = %kind, endpoint = %client.base_url(), "Opened remote dictionary");
        Ok(Self { kind, client })
    }

    /// Map a DictClientError to a BackendError
    fn map_err(e: DictClientError) -> BackendError {
        match e {
            DictClientError::Timeout => BackendError::Timeout,
            DictClientError::HttpError(e) => BackendError::Transport(e.to_string()),
            DictClientError::ConnectionFailed(m) => BackendError::Transport(m),
            DictClientError::ServerError { status, message } => {
                BackendError::Upstream { status, message }
            }
            DictClientError::ParseError(m) => BackendError::InvalidResponse(m),
            other => BackendError::Internal(other.to_string()),
        }
    }
}

impl Drop for RemoteDictionary {
    fn drop(&mut self) {
        tracing::debug!(kind = %self.kind, endpoint = %self.client.base_url(), "Closed remote dictionary");
    }
}

#[async_trait]
impl DictionaryClient for RemoteDictionary {
    fn kind(&self) -> DictionaryKind {
        self.kind
    }

    fn target(&self) -> String {
        self.client.base_url().to_string()
    }

    async fn lookup(&self, cve_ids: &[String]) -> BackendResult<HashMap<String, serde_json::Value>> {
        if cve_ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.client.lookup(cve_ids).await.map_err(Self::map_err)
    }
}
