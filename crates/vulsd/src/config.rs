//! TOML configuration and the merged startup settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;
use vuls_core::{ConfigError, DictionaryConfig, DictionaryKind};
use vuls_gateway::FactoryOptions;

use crate::cli::Args;

pub const DEFAULT_LISTEN: &str = "localhost:5515";

/// `[server]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub listen: Option<String>,
    #[serde(default)]
    pub probe_timeout_secs: Option<u64>,
    #[serde(default)]
    pub query_timeout_secs: Option<u64>,
    #[serde(default, alias = "httpProxy")]
    pub http_proxy: Option<String>,
}

/// Top-level configuration file
///
/// ```toml
/// [server]
/// listen = "0.0.0.0:5515"
/// http_proxy = "http://proxy.internal:8080"
///
/// [cve_dict]
/// type = "sqlite3"
/// sqlite3_path = "/var/lib/vuls/cve.sqlite3"
///
/// [oval_dict]
/// type = "http"
/// url = "http://localhost:1324"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(flatten)]
    pub dictionaries: DictionaryConfig,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e,
        })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

/// Everything startup needs, fixed before any backend is touched
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen: String,
    pub dictionaries: DictionaryConfig,
    pub options: FactoryOptions,
    /// Directory relative database paths are resolved against
    pub base_dir: PathBuf,
}

impl Settings {
    /// Merge the config file named by `--config`, if any, with the flags
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading config file");
                FileConfig::load(path)?
            }
            None => FileConfig::default(),
        };
        let base_dir = std::env::current_dir().map_err(|e| ConfigError::File {
            path: ".".to_string(),
            reason: format!("cannot determine working directory: {}", e),
        })?;
        Self::merge(file, args, base_dir)
    }

    /// Non-empty flag values overwrite file values field by field
    pub fn merge(file: FileConfig, args: &Args, base_dir: PathBuf) -> Result<Self, ConfigError> {
        let FileConfig {
            server,
            mut dictionaries,
        } = file;

        let flags = args.dictionaries();
        for kind in DictionaryKind::ALL {
            dictionaries.get_mut(kind).overwrite(flags.get(kind));
        }
        if dictionaries.cve_dict.is_empty() {
            dictionaries.cve_dict.db_type = "sqlite3".to_string();
        }

        let listen = args
            .listen
            .clone()
            .or(server.listen)
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        validate_listen(&listen)?;

        let mut options = FactoryOptions::default();
        if let Some(secs) = args.probe_timeout_secs.or(server.probe_timeout_secs) {
            options.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = args.query_timeout_secs.or(server.query_timeout_secs) {
            options.query_timeout = Duration::from_secs(secs);
        }
        options.http_proxy = args
            .http_proxy
            .clone()
            .or(server.http_proxy)
            .filter(|proxy| !proxy.trim().is_empty())
            .map(|proxy| parse_proxy(&proxy))
            .transpose()?;
        options.debug_sql = args.debug_sql;

        Ok(Self {
            listen,
            dictionaries,
            options,
            base_dir,
        })
    }
}

fn parse_proxy(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidProxy {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {:?}", other))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Accepts `host:port` and `[v6]:port` with a numeric port
fn validate_listen(listen: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidListenAddress(listen.to_string());
    let (host, port) = listen.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(invalid());
    }
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(invalid());
    }
    port.parse::<u16>().map_err(|_| invalid())?;
    Ok(())
}
