//! SqlDictionary - DictionaryClient over a MySQL or PostgreSQL table

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};
use url::Url;
use vuls_core::{BackendError, BackendResult, DbEngine, DictionaryClient, DictionaryKind};

use crate::{decode_document, NetDbError, NetDbOptions};

/// Bound parameters per statement
const MAX_IDS_PER_QUERY: usize = 500;

enum Pool {
    MySql(MySqlPool),
    Postgres(PgPool),
}

/// A dictionary table read through a connection pool.
///
/// The pool is shared by every concurrent lookup and closed when this value
/// is dropped.
pub struct SqlDictionary {
    kind: DictionaryKind,
    engine: DbEngine,
    target: String,
    pool: Pool,
    log_statements: bool,
}

impl SqlDictionary {
    /// Open a pool and check that the `entries` table can be read
    pub async fn connect(
        kind: DictionaryKind,
        engine: DbEngine,
        url: &Url,
        target: String,
        options: &NetDbOptions,
    ) -> Result<Self, NetDbError> {
        let connect_err = |e: sqlx::Error| NetDbError::Connect {
            target: target.clone(),
            reason: e.to_string(),
        };

        let pool = match engine {
            DbEngine::MySql => Pool::MySql(
                MySqlPoolOptions::new()
                    .max_connections(options.max_connections)
                    .acquire_timeout(options.connect_timeout)
                    .connect(url.as_str())
                    .await
                    .map_err(connect_err)?,
            ),
            DbEngine::Postgres => Pool::Postgres(
                PgPoolOptions::new()
                    .max_connections(options.max_connections)
                    .acquire_timeout(options.connect_timeout)
                    .connect(url.as_str())
                    .await
                    .map_err(connect_err)?,
            ),
            DbEngine::Redis => {
                return Err(NetDbError::Connect {
                    target,
                    reason: "redis is not an SQL engine".to_string(),
                })
            }
        };

        let dict = Self {
            kind,
            engine,
            target,
            pool,
            log_statements: options.log_statements,
        };
        dict.fetch("SELECT cve_id, content FROM entries WHERE 1 = 0", &[])
            .await
            .map_err(|e| NetDbError::Schema {
                target: dict.target.clone(),
                reason: e.to_string(),
            })?;

        info!(kind = %kind, engine = %engine, target = %dict.target, "Opened database dictionary");
        Ok(dict)
    }

    async fn fetch(&self, sql: &str, ids: &[String]) -> Result<Vec<(String, String)>, sqlx::Error> {
        match &self.pool {
            Pool::MySql(pool) => {
                let mut query = sqlx::query_as::<sqlx::MySql, (String, String)>(sql);
                for id in ids {
                    query = query.bind(id.as_str());
                }
                query.fetch_all(pool).await
            }
            Pool::Postgres(pool) => {
                let mut query = sqlx::query_as::<sqlx::Postgres, (String, String)>(sql);
                for id in ids {
                    query = query.bind(id.as_str());
                }
                query.fetch_all(pool).await
            }
        }
    }
}

/// `SELECT` for `count` ids in the engine's placeholder syntax
fn select_sql(engine: DbEngine, count: usize) -> String {
    let placeholders: Vec<String> = match engine {
        DbEngine::Postgres => (1..=count).map(|i| format!("${}", i)).collect(),
        _ => vec!["?".to_string(); count],
    };
    format!(
        "SELECT cve_id, content FROM entries WHERE cve_id IN ({})",
        placeholders.join(",")
    )
}

fn map_err(e: sqlx::Error) -> BackendError {
    match e {
        sqlx::Error::PoolTimedOut => BackendError::Timeout,
        sqlx::Error::Io(e) => BackendError::Transport(e.to_string()),
        sqlx::Error::Tls(e) => BackendError::Transport(e.to_string()),
        sqlx::Error::PoolClosed => BackendError::Transport("connection pool closed".to_string()),
        other => BackendError::Database(other.to_string()),
    }
}

impl Drop for SqlDictionary {
    fn drop(&mut self) {
        info!(kind = %self.kind, target = %self.target, "Closed database dictionary");
    }
}

#[async_trait]
impl DictionaryClient for SqlDictionary {
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
        debug!(kind = %self.kind, engine = %self.engine, count = cve_ids.len(), "Database lookup");

        let mut found = HashMap::new();
        for chunk in cve_ids.chunks(MAX_IDS_PER_QUERY) {
            let sql = select_sql(self.engine, chunk.len());
            if self.log_statements {
                info!(kind = %self.kind, sql = %sql, params = ?chunk, "SQL");
            }
            for (cve_id, content) in self.fetch(&sql, chunk).await.map_err(map_err)? {
                let document = decode_document(&cve_id, &content)?;
                found.insert(cve_id, document);
            }
        }
        Ok(found)
    }
}
