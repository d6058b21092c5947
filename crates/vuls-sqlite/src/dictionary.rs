//! SqliteDictionary - DictionaryClient backed by a local SQLite file

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;
use tracing::{debug, info};
use vuls_core::{BackendError, BackendResult, DictionaryClient, DictionaryKind};

use crate::lock::{is_busy, is_contended, open_regular_file};

/// Table layout every embedded dictionary must provide
pub const SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS entries (cve_id TEXT PRIMARY KEY, content TEXT NOT NULL)";

/// Bound parameters per statement, below SQLITE_MAX_VARIABLE_NUMBER on old builds
const MAX_IDS_PER_QUERY: usize = 500;
/// How long a lookup waits on a writer's lock once the dictionary is open
const LOOKUP_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Why an embedded dictionary could not be opened
#[derive(Debug, Error)]
pub enum SqliteOpenError {
    #[error("{} is locked by another process", path.display())]
    Locked { path: PathBuf },

    #[error("cannot open {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    #[error("{} is not a usable dictionary: {reason}", path.display())]
    Database { path: PathBuf, reason: String },
}

/// An embedded dictionary opened read-only.
///
/// Holds an exclusive advisory lock on the database file until dropped.
pub struct SqliteDictionary {
    kind: DictionaryKind,
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
    lock: File,
    log_sql: bool,
}

impl SqliteDictionary {
    /// Lock and open the dictionary at `path`
    pub fn open(kind: DictionaryKind, path: &Path) -> Result<Self, SqliteOpenError> {
        let lock = open_regular_file(path).map_err(|e| SqliteOpenError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        FileExt::try_lock_exclusive(&lock).map_err(|e| {
            if is_contended(&e) {
                SqliteOpenError::Locked {
                    path: path.to_path_buf(),
                }
            } else {
                SqliteOpenError::Io {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })?;

        // The lock file handle is dropped (and the lock released) on any
        // error below.
        let conn = open_connection(path).map_err(|e| match e {
            ConnectionError::Busy => SqliteOpenError::Locked {
                path: path.to_path_buf(),
            },
            ConnectionError::Unusable(reason) => SqliteOpenError::Database {
                path: path.to_path_buf(),
                reason,
            },
        })?;

        let entries: i64 = conn
            .query_row("SELECT count(*) FROM entries", [], |row| row.get(0))
            .unwrap_or(0);
        info!(kind = %kind, path = %path.display(), entries, "Opened embedded dictionary");

        Ok(Self {
            kind,
            path: path.to_path_buf(),
            conn: Arc::new(Mutex::new(conn)),
            lock,
            log_sql: false,
        })
    }

    /// Log every statement this dictionary runs at info level
    pub fn with_sql_logging(mut self, enabled: bool) -> Self {
        self.log_sql = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

enum ConnectionError {
    /// Another connection holds the database lock
    Busy,
    Unusable(String),
}

impl From<rusqlite::Error> for ConnectionError {
    fn from(err: rusqlite::Error) -> Self {
        if is_busy(&err) {
            Self::Busy
        } else {
            Self::Unusable(err.to_string())
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection, ConnectionError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)?;
    conn.busy_timeout(Duration::ZERO)?;

    // Reading sqlite_master fails on files that are not SQLite databases.
    let has_entries: bool = conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'entries'",
        [],
        |row| row.get(0),
    )?;
    if !has_entries {
        return Err(ConnectionError::Unusable(
            "missing table 'entries'".to_string(),
        ));
    }

    conn.busy_timeout(LOOKUP_BUSY_TIMEOUT)?;
    Ok(conn)
}

fn query_entries(
    kind: DictionaryKind,
    conn: &Connection,
    cve_ids: &[String],
    log_sql: bool,
) -> BackendResult<HashMap<String, serde_json::Value>> {
    let mut found = HashMap::new();

    for chunk in cve_ids.chunks(MAX_IDS_PER_QUERY) {
        let placeholders = vec!["?"; chunk.len()].join(",");
        let sql = format!(
            "SELECT cve_id, content FROM entries WHERE cve_id IN ({})",
            placeholders
        );
        if log_sql {
            info!(kind = %kind, sql = %sql, params = ?chunk, "SQL");
        }
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| BackendError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| BackendError::Database(e.to_string()))?;

        for row in rows {
            let (cve_id, content) = row.map_err(|e| BackendError::Database(e.to_string()))?;
            let document = serde_json::from_str(&content).map_err(|e| {
                BackendError::InvalidResponse(format!("{}: invalid JSON content: {}", cve_id, e))
            })?;
            found.insert(cve_id, document);
        }
    }

    Ok(found)
}

impl Drop for SqliteDictionary {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock);
        info!(kind = %self.kind, path = %self.path.display(), "Closed embedded dictionary");
    }
}

#[async_trait]
impl DictionaryClient for SqliteDictionary {
    fn kind(&self) -> DictionaryKind {
        self.kind
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }

    async fn lookup(&self, cve_ids: &[String]) -> BackendResult<HashMap<String, serde_json::Value>> {
        if cve_ids.is_empty() {
            return Ok(HashMap::new());
        }
        debug!(kind = %self.kind, count = cve_ids.len(), "Embedded lookup");

        let conn = Arc::clone(&self.conn);
        let ids = cve_ids.to_vec();
        let (kind, log_sql) = (self.kind, self.log_sql);
        tokio::task::spawn_blocking(move || query_entries(kind, &conn.lock(), &ids, log_sql))
            .await
            .map_err(|e| BackendError::Internal(format!("lookup task failed: {}", e)))?
    }
}
