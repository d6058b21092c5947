//! vuls-netdb - Dictionary backends in network databases
//!
//! The dictionaries' fetch tools can write into MySQL, PostgreSQL or Redis
//! instead of a local SQLite file. This crate reads the same layout from
//! those databases:
//!
//! - MySQL / PostgreSQL: a table `entries (cve_id, content)` where `content`
//!   is one JSON document per CVE, as in the embedded files.
//! - Redis: a hash `entries` mapping CVE ID to the JSON document.
//!
//! Unlike embedded files, network databases take no exclusive lock: several
//! servers may read one database at the same time.

mod redis_backend;
mod sql;

use std::time::Duration;

use thiserror::Error;
use url::Url;
use vuls_core::{BackendError, BackendResult, DbEngine, DictionaryClient, DictionaryKind};

pub use redis_backend::{RedisDictionary, ENTRIES_KEY};
pub use sql::SqlDictionary;

/// Connection settings shared by every network database backend
#[derive(Debug, Clone)]
pub struct NetDbOptions {
    /// Bound for establishing the first connection
    pub connect_timeout: Duration,
    /// Pool size for SQL engines
    pub max_connections: u32,
    /// Log every statement at info level
    pub log_statements: bool,
}

impl Default for NetDbOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_connections: 10,
            log_statements: false,
        }
    }
}

/// Why a network database dictionary could not be opened
#[derive(Debug, Error)]
pub enum NetDbError {
    #[error("cannot connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("{target} is not a usable dictionary: {reason}")]
    Schema { target: String, reason: String },
}

/// Connect to the dictionary in `url` and check its layout.
///
/// `target` is the password-free form of `url` used in logs and errors.
pub async fn connect(
    kind: DictionaryKind,
    engine: DbEngine,
    url: &Url,
    target: String,
    options: &NetDbOptions,
) -> Result<Box<dyn DictionaryClient>, NetDbError> {
    match engine {
        DbEngine::MySql | DbEngine::Postgres => {
            let dict = SqlDictionary::connect(kind, engine, url, target, options).await?;
            Ok(Box::new(dict))
        }
        DbEngine::Redis => {
            let dict = RedisDictionary::connect(kind, url, target, options).await?;
            Ok(Box::new(dict))
        }
    }
}

/// Parse one stored dictionary document
pub(crate) fn decode_document(cve_id: &str, content: &str) -> BackendResult<serde_json::Value> {
    serde_json::from_str(content).map_err(|e| {
        BackendError::InvalidResponse(format!("{}: invalid JSON content: {}", cve_id, e))
    })
}
