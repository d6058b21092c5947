//! AggregateHandle - owns every opened backend and fans queries out over them

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};
use vuls_core::{
    BackendError, BackendResult, DictionaryClient, DictionaryKind, EnrichedResult,
    PartialBackendError, ScanResult,
};

use crate::error::DispatchError;

/// The opened backends for one service lifetime.
///
/// Read-only once built: requests share it behind an `Arc` and only ever
/// call [`dispatch`](Self::dispatch). Dropping the handle, or calling
/// [`close`](Self::close), releases every file lock and connection pool
/// exactly once.
pub struct AggregateHandle {
    /// Opened clients, mandatory backend first
    clients: Vec<Box<dyn DictionaryClient>>,
    query_timeout: Duration,
}

impl AggregateHandle {
    /// Wrap already opened clients.
    ///
    /// Callers normally go through [`ClientFactory`](crate::ClientFactory),
    /// which guarantees every enabled backend passed its checks.
    pub fn new(mut clients: Vec<Box<dyn DictionaryClient>>, query_timeout: Duration) -> Self {
        clients.sort_by_key(|c| c.kind());
        info!(
            backends = ?clients.iter().map(|c| c.kind()).collect::<Vec<_>>(),
            "Dictionary backends ready"
        );
        Self {
            clients,
            query_timeout,
        }
    }

    /// Kinds of the opened backends
    pub fn kinds(&self) -> Vec<DictionaryKind> {
        self.clients.iter().map(|c| c.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Get the client for a dictionary kind
    pub fn client(&self, kind: DictionaryKind) -> Option<&dyn DictionaryClient> {
        self.clients
            .iter()
            .find(|c| c.kind() == kind)
            .map(|c| c.as_ref())
    }

    /// Enrich a scan result with documents from every backend.
    ///
    /// Backends are queried concurrently, each under the query timeout.
    /// A failing CVE dictionary fails the whole request; a failing optional
    /// backend only adds a warning. Dropping the returned future cancels
    /// all in-flight lookups of this request.
    pub async fn dispatch(&self, mut scan: ScanResult) -> Result<EnrichedResult, DispatchError> {
        let cve_ids = scan.cve_ids();
        let mut dictionaries = Vec::with_capacity(self.clients.len());
        let mut warnings = Vec::new();

        if cve_ids.is_empty() {
            debug!(server = %scan.server_name, "No CVEs to enrich");
            return Ok(EnrichedResult {
                result: scan,
                enriched_at: Utc::now(),
                dictionaries: self.kinds(),
                warnings,
            });
        }

        let lookups = self.clients.iter().map(|client| {
            let cve_ids = &cve_ids;
            async move { (client.kind(), self.lookup_bounded(client.as_ref(), cve_ids).await) }
        });
        let outcomes = join_all(lookups).await;

        for (kind, outcome) in outcomes {
            match outcome {
                Ok(found) => {
                    merge(&mut scan, kind, &found);
                    dictionaries.push(kind);
                }
                Err(e) if kind.is_mandatory() => {
                    warn!(kind = %kind, error = %e, "Mandatory dictionary failed");
                    return Err(DispatchError::MandatoryBackend {
                        kind,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Optional dictionary failed, degrading response");
                    warnings.push(PartialBackendError {
                        kind,
                        message: e.to_string(),
                    });
                }
            }
        }

        debug!(
            server = %scan.server_name,
            cves = cve_ids.len(),
            warnings = warnings.len(),
            "Enriched scan result"
        );
        Ok(EnrichedResult {
            result: scan,
            enriched_at: Utc::now(),
            dictionaries,
            warnings,
        })
    }

    async fn lookup_bounded(
        &self,
        client: &dyn DictionaryClient,
        cve_ids: &[String],
    ) -> BackendResult<HashMap<String, serde_json::Value>> {
        match tokio::time::timeout(self.query_timeout, client.lookup(cve_ids)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        }
    }

    /// Release every backend
    pub fn close(self) {
        drop(self);
    }
}

/// Attach the documents one backend found to the matching vulnerabilities
fn merge(scan: &mut ScanResult, kind: DictionaryKind, found: &HashMap<String, serde_json::Value>) {
    for (key, info) in scan.scanned_cves.iter_mut() {
        let id = if info.cve_id.is_empty() {
            key.as_str()
        } else {
            info.cve_id.as_str()
        };
        if let Some(document) = found.get(id) {
            info.cve_contents.insert(kind, document.clone());
        }
    }
}

impl Drop for AggregateHandle {
    fn drop(&mut self) {
        while let Some(client) = self.clients.pop() {
            debug!(kind = %client.kind(), target = %client.target(), "Releasing backend");
            drop(client);
        }
        info!("Released all dictionary backends");
    }
}
