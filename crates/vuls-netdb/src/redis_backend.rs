//! RedisDictionary - DictionaryClient over a Redis hash

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;
use vuls_core::{BackendError, BackendResult, DictionaryClient, DictionaryKind};

use crate::{decode_document, NetDbError, NetDbOptions};

/// Hash holding one JSON document per CVE ID
pub const ENTRIES_KEY: &str = "entries";

/// Fields per HMGET
const MAX_IDS_PER_COMMAND: usize = 500;

/// A dictionary stored in one Redis hash.
///
/// The connection manager reconnects on its own and is cloned per lookup.
pub struct RedisDictionary {
    kind: DictionaryKind,
    target: String,
    manager: ConnectionManager,
    log_commands: bool,
}

impl RedisDictionary {
    /// Connect and check that `entries` is a hash, or absent
    pub async fn connect(
        kind: DictionaryKind,
        url: &Url,
        target: String,
        options: &NetDbOptions,
    ) -> Result<Self, NetDbError> {
        let connect_err = |reason: String| NetDbError::Connect {
            target: target.clone(),
            reason,
        };

        let client = redis::Client::open(url.as_str()).map_err(|e| connect_err(e.to_string()))?;
        let mut manager = timeout(options.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| connect_err(format!("no connection within {:?}", options.connect_timeout)))?
            .map_err(|e| connect_err(e.to_string()))?;

        let key_type: String = redis::cmd("TYPE")
            .arg(ENTRIES_KEY)
            .query_async(&mut manager)
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        match key_type.as_str() {
            "hash" => {}
            "none" => warn!(kind = %kind, target = %target, "Redis dictionary has no entries yet"),
            other => {
                return Err(NetDbError::Schema {
                    target,
                    reason: format!("key '{}' is a {}, expected a hash", ENTRIES_KEY, other),
                })
            }
        }

        info!(kind = %kind, target = %target, "Opened redis dictionary");
        Ok(Self {
            kind,
            target,
            manager,
            log_commands: options.log_statements,
        })
    }
}

fn map_err(e: redis::RedisError) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        BackendError::Transport(e.to_string())
    } else {
        BackendError::Database(e.to_string())
    }
}

impl Drop for RedisDictionary {
    fn drop(&mut self) {
        info!(kind = %self.kind, target = %self.target, "Closed redis dictionary");
    }
}

#[async_trait]
impl DictionaryClient for RedisDictionary {
    fn kind(&self) -> DictionaryKind {
        self.kind
    }

    fn target(&self) -> String {
        self.target.clone()
    }

    async fn lookup(&self, cve_ids: &[String]) -> BackendResult<HashMap<String, serde_json::Value>> {
        if cve_ids.is_empty() {
            return Ok(HashMap::new());
        }
        debug!(kind = %self.kind, count = cve_ids.len(), "Redis lookup");

        let mut conn = self.manager.clone();
        let mut found = HashMap::new();
        for chunk in cve_ids.chunks(MAX_IDS_PER_COMMAND) {
            if self.log_commands {
                info!(kind = %self.kind, command = "HMGET", key = ENTRIES_KEY, params = ?chunk, "Redis command");
            }
            let values: Vec<Option<String>> = redis::cmd("HMGET")
                .arg(ENTRIES_KEY)
                .arg(chunk)
                .query_async(&mut conn)
                .await
                .map_err(map_err)?;

            for (cve_id, content) in chunk.iter().zip(values) {
                if let Some(content) = content {
                    found.insert(cve_id.clone(), decode_document(cve_id, &content)?);
                }
            }
        }
        Ok(found)
    }
}
