//! Backend descriptors and their resolution from raw configuration
//!
//! Every dictionary backend is configured by a `{type, sqlite3_path, url}`
//! triple. Resolution turns that triple into a [`BackendDescriptor`] with
//! exactly one active [`Transport`], or into `None` when the backend is
//! disabled for this run.
//!
//! The url is either a dictionary server (`http://`, `https://`) or a
//! database connection string. Connection strings are accepted in URL form
//! (`mysql://`, `postgres://`, `redis://`) and in the forms the Go
//! dictionaries document: `user:pass@tcp(host:3306)/cve` for MySQL and
//! `host=db port=5432 user=vuls dbname=cve` for PostgreSQL.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Engines served from a local single-file database
const EMBEDDED_ENGINES: &[&str] = &["sqlite3"];
/// Engines that only make sense with a connection url
const NETWORK_ENGINES: &[&str] = &["mysql", "postgres", "redis", "http"];

/// The dictionaries a server can consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DictionaryKind {
    /// CVE dictionary (mandatory)
    Cve,
    /// OS advisory / OVAL dictionary
    Oval,
    /// Distribution security tracker
    Gost,
}

impl DictionaryKind {
    /// All kinds, in startup order. The mandatory backend comes first.
    pub const ALL: [DictionaryKind; 3] = [Self::Cve, Self::Oval, Self::Gost];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cve => "cve",
            Self::Oval => "oval",
            Self::Gost => "gost",
        }
    }

    /// Whether the service refuses to start without this backend
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::Cve)
    }

    /// File name used when `type = "sqlite3"` is given without a path
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Self::Cve => "cve.sqlite3",
            Self::Oval => "oval.sqlite3",
            Self::Gost => "gost.sqlite3",
        }
    }
}

impl fmt::Display for DictionaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database engines reachable through a connection string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbEngine {
    MySql,
    Postgres,
    Redis,
}

impl DbEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Redis => "redis",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
            Self::Redis => 6379,
        }
    }

    fn from_type(db_type: &str) -> Option<Self> {
        match db_type {
            "mysql" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "redis" => Some(Self::Redis),
            _ => None,
        }
    }
}

impl fmt::Display for DbEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw per-backend configuration as supplied by flags or the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictConf {
    /// Engine tag (sqlite3, mysql, postgres, redis, http)
    #[serde(default, rename = "type")]
    pub db_type: String,
    /// Path of the embedded database file
    #[serde(default, alias = "SQLite3Path")]
    pub sqlite3_path: String,
    /// Dictionary server url
    #[serde(default)]
    pub url: String,
}

impl DictConf {
    pub fn is_empty(&self) -> bool {
        self.db_type.trim().is_empty()
            && self.sqlite3_path.trim().is_empty()
            && self.url.trim().is_empty()
    }

    /// Overwrite fields with the non-empty fields of `other`
    pub fn overwrite(&mut self, other: &DictConf) {
        if !other.db_type.is_empty() {
            self.db_type = other.db_type.clone();
        }
        if !other.sqlite3_path.is_empty() {
            self.sqlite3_path = other.sqlite3_path.clone();
        }
        if !other.url.is_empty() {
            self.url = other.url.clone();
        }
    }
}

/// How a backend is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Local single-file database, opened under an exclusive lock
    Embedded { path: PathBuf },
    /// Remote dictionary server
    Network { endpoint: Url },
    /// Dictionary tables in a network database, `url` in the engine's URL form
    Database { engine: DbEngine, url: Url },
}

impl Transport {
    /// Human-readable location, used in diagnostics. Never shows a password.
    pub fn target(&self) -> String {
        match self {
            Transport::Embedded { path } => path.display().to_string(),
            Transport::Network { endpoint } => redacted(endpoint),
            Transport::Database { url, .. } => redacted(url),
        }
    }
}

/// `url` with any password masked
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.password().is_some() {
        let _ = shown.set_password(Some("***"));
    }
    shown.to_string()
}

/// `host:port` of a database url, with the engine's default port filled in
pub fn socket_address(engine: DbEngine, url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(format!("{}:{}", host, url.port().unwrap_or(engine.default_port())))
}

/// A validated backend configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub kind: DictionaryKind,
    pub transport: Transport,
}

impl BackendDescriptor {
    pub fn embedded(kind: DictionaryKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            transport: Transport::Embedded { path: path.into() },
        }
    }

    pub fn network(kind: DictionaryKind, endpoint: Url) -> Self {
        Self {
            kind,
            transport: Transport::Network { endpoint },
        }
    }

    pub fn database(kind: DictionaryKind, engine: DbEngine, url: Url) -> Self {
        Self {
            kind,
            transport: Transport::Database { engine, url },
        }
    }

    pub fn target(&self) -> String {
        self.transport.target()
    }
}

/// Resolve one backend's raw configuration.
///
/// A non-empty url always selects a network transport: a dictionary server
/// for `http(s)://` urls, a database for connection strings. Otherwise a
/// path, or an embedded engine type, selects the embedded transport. An entirely empty
/// configuration disables the backend, which is an error for the CVE
/// dictionary only.
pub fn resolve(
    kind: DictionaryKind,
    conf: &DictConf,
    base_dir: &Path,
) -> Result<Option<BackendDescriptor>, ConfigError> {
    let db_type = conf.db_type.trim().to_ascii_lowercase();
    let path = conf.sqlite3_path.trim();
    let url = conf.url.trim();

    if !url.is_empty() {
        let transport = parse_connection(kind, &db_type, url)?;
        return Ok(Some(BackendDescriptor { kind, transport }));
    }

    if !path.is_empty() {
        return Ok(Some(BackendDescriptor::embedded(kind, base_dir.join(path))));
    }

    if EMBEDDED_ENGINES.contains(&db_type.as_str()) {
        return Ok(Some(BackendDescriptor::embedded(
            kind,
            base_dir.join(kind.default_file_name()),
        )));
    }

    if NETWORK_ENGINES.contains(&db_type.as_str()) {
        return Err(ConfigError::MissingConnection { kind, db_type });
    }

    if !db_type.is_empty() {
        return Err(ConfigError::UnknownType { kind, db_type });
    }

    if kind.is_mandatory() {
        return Err(ConfigError::CveNotConfigured);
    }
    Ok(None)
}

fn parse_connection(kind: DictionaryKind, db_type: &str, raw: &str) -> Result<Transport, ConfigError> {
    let scheme = raw.split_once("://").map(|(s, _)| s.to_ascii_lowercase());
    if let Some("http" | "https") = scheme.as_deref() {
        return Ok(Transport::Network {
            endpoint: parse_url(kind, raw)?,
        });
    }

    let from_scheme = scheme.as_deref().map(|s| {
        DbEngine::from_type(s).ok_or_else(|| ConfigError::UnsupportedConnection {
            kind,
            url: raw.to_string(),
        })
    });
    let engine = match (from_scheme.transpose()?, DbEngine::from_type(db_type)) {
        (Some(engine), None) | (None, Some(engine)) => engine,
        (Some(engine), Some(declared)) if engine == declared => engine,
        (Some(engine), Some(declared)) => {
            return Err(invalid(
                kind,
                raw,
                format!("type {} does not match a {} connection string", declared, engine),
            ))
        }
        (None, None) => {
            return Err(ConfigError::UnsupportedConnection {
                kind,
                url: raw.to_string(),
            })
        }
    };

    let url = match (engine, scheme.is_some()) {
        (_, true) => parse_url(kind, raw)?,
        (DbEngine::MySql, false) => mysql_dsn(kind, raw)?,
        (DbEngine::Postgres, false) => postgres_dsn(kind, raw)?,
        (DbEngine::Redis, false) => parse_url(kind, &format!("redis://{}", raw))?,
    };
    Ok(Transport::Database { engine, url })
}

fn parse_url(kind: DictionaryKind, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| invalid(kind, raw, e.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid(kind, raw, "missing host"));
    }
    Ok(url)
}

fn invalid(kind: DictionaryKind, raw: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidUrl {
        kind,
        url: raw.to_string(),
        reason: reason.into(),
    }
}

/// `[user[:password]@][tcp[(host[:port])]]/dbname[?params]`. Driver
/// parameters are dropped.
fn mysql_dsn(kind: DictionaryKind, raw: &str) -> Result<Url, ConfigError> {
    let (head, tail) = raw
        .rsplit_once('/')
        .ok_or_else(|| invalid(kind, raw, "missing /dbname"))?;
    let dbname = tail.split_once('?').map_or(tail, |(db, _)| db);
    let (credentials, net) = head.rsplit_once('@').unwrap_or(("", head));

    let address = match net {
        "" | "tcp" => "127.0.0.1:3306",
        _ => net
            .strip_prefix("tcp(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| invalid(kind, raw, "only tcp(host:port) addresses are supported"))?,
    };

    let mut url = parse_url(kind, &format!("mysql://{}/{}", address, dbname))
        .map_err(|_| invalid(kind, raw, format!("invalid address {:?}", address)))?;
    if !credentials.is_empty() {
        let (user, password) = credentials
            .split_once(':')
            .map_or((credentials, None), |(u, p)| (u, Some(p)));
        url.set_username(user)
            .and_then(|()| url.set_password(password))
            .map_err(|()| invalid(kind, raw, "invalid credentials"))?;
    }
    Ok(url)
}

/// `key=value` pairs separated by whitespace. Quoted values are not supported.
fn postgres_dsn(kind: DictionaryKind, raw: &str) -> Result<Url, ConfigError> {
    let mut host = "localhost";
    let mut port = None;
    let mut user = None;
    let mut password = None;
    let mut dbname = "";
    let mut params = Vec::new();

    for pair in raw.split_whitespace() {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| invalid(kind, raw, format!("expected key=value, got {:?}", pair)))?;
        match key {
            "host" => host = value,
            "port" => {
                port = Some(
                    value
                        .parse::<u16>()
                        .map_err(|_| invalid(kind, raw, format!("invalid port {:?}", value)))?,
                )
            }
            "user" => user = Some(value),
            "password" => password = Some(value),
            "dbname" => dbname = value,
            _ => params.push((key, value)),
        }
    }

    let address = match port {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let mut url = parse_url(kind, &format!("postgres://{}/{}", address, dbname))?;
    if let Some(user) = user {
        url.set_username(user)
            .and_then(|()| url.set_password(password))
            .map_err(|()| invalid(kind, raw, "invalid credentials"))?;
    }
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

/// Raw configuration for all three dictionaries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryConfig {
    #[serde(default, alias = "cveDict")]
    pub cve_dict: DictConf,
    #[serde(default, alias = "ovalDict")]
    pub oval_dict: DictConf,
    #[serde(default)]
    pub gost: DictConf,
}

impl DictionaryConfig {
    pub fn get(&self, kind: DictionaryKind) -> &DictConf {
        match kind {
            DictionaryKind::Cve => &self.cve_dict,
            DictionaryKind::Oval => &self.oval_dict,
            DictionaryKind::Gost => &self.gost,
        }
    }

    pub fn get_mut(&mut self, kind: DictionaryKind) -> &mut DictConf {
        match kind {
            DictionaryKind::Cve => &mut self.cve_dict,
            DictionaryKind::Oval => &mut self.oval_dict,
            DictionaryKind::Gost => &mut self.gost,
        }
    }

    /// Resolve every enabled backend, CVE first
    pub fn resolve_all(&self, base_dir: &Path) -> Result<Vec<BackendDescriptor>, ConfigError> {
        let mut descriptors = Vec::with_capacity(DictionaryKind::ALL.len());
        for kind in DictionaryKind::ALL {
            if let Some(descriptor) = resolve(kind, self.get(kind), base_dir)? {
                tracing::debug!(kind = %kind, target = %descriptor.target(), "Resolved backend");
                descriptors.push(descriptor);
            }
        }
        Ok(descriptors)
    }
}
