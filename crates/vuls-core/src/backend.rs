//! DictionaryClient trait - the core abstraction for dictionary backends

use std::collections::HashMap;

use async_trait::async_trait;

use crate::descriptor::DictionaryKind;
use crate::error::BackendResult;

/// An opened dictionary backend.
///
/// Implementations must be safe for concurrent use: the aggregate handle
/// shares one instance per backend across every in-flight request.
/// Dropping the client releases its file lock or connection pool.
#[async_trait]
pub trait DictionaryClient: Send + Sync {
    /// Which dictionary this client serves
    fn kind(&self) -> DictionaryKind;

    /// Path or endpoint, for diagnostics
    fn target(&self) -> String;

    /// Fetch the dictionary documents for the given CVE IDs.
    ///
    /// IDs unknown to the dictionary are absent from the returned map.
    async fn lookup(&self, cve_ids: &[String]) -> BackendResult<HashMap<String, serde_json::Value>>;
}
