//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;
use vuls_core::{DictConf, DictionaryConfig};

/// Vulnerability dictionary server
///
/// Enriches scan results posted to /vuls with entries from a CVE dictionary
/// and, optionally, an OVAL dictionary and a gost security tracker. Each
/// dictionary is either a local SQLite file or a dictionary server URL.
#[derive(Debug, Default, Parser)]
#[command(name = "vulsd")]
#[command(author, version, about)]
pub struct Args {
    /// Configuration file path (TOML)
    #[arg(long, env = "VULSD_CONFIG")]
    pub config: Option<PathBuf>,

    /// host:port to listen on [default: localhost:5515]
    #[arg(long, env = "VULSD_LISTEN")]
    pub listen: Option<String>,

    /// CVE dictionary type: sqlite3, mysql, postgres, redis or http [default: sqlite3]
    #[arg(long, env = "VULSD_CVEDB_TYPE")]
    pub cvedb_type: Option<String>,

    /// Path of the CVE dictionary SQLite file
    #[arg(long, env = "VULSD_CVEDB_PATH")]
    pub cvedb_path: Option<String>,

    /// URL of a go-cve-dictionary server
    #[arg(long, env = "VULSD_CVEDB_URL")]
    pub cvedb_url: Option<String>,

    /// OVAL dictionary type
    #[arg(long, env = "VULSD_OVALDB_TYPE")]
    pub ovaldb_type: Option<String>,

    /// Path of the OVAL dictionary SQLite file
    #[arg(long, env = "VULSD_OVALDB_PATH")]
    pub ovaldb_path: Option<String>,

    /// URL of a goval-dictionary server
    #[arg(long, env = "VULSD_OVALDB_URL")]
    pub ovaldb_url: Option<String>,

    /// gost dictionary type
    #[arg(long, env = "VULSD_GOSTDB_TYPE")]
    pub gostdb_type: Option<String>,

    /// Path of the gost SQLite file
    #[arg(long, env = "VULSD_GOSTDB_PATH")]
    pub gostdb_path: Option<String>,

    /// URL of a gost server
    #[arg(long, env = "VULSD_GOSTDB_URL")]
    pub gostdb_url: Option<String>,

    /// HTTP proxy for dictionary servers, e.g. http://192.168.0.1:8080
    #[arg(long, env = "VULSD_HTTP_PROXY")]
    pub http_proxy: Option<String>,

    /// Seconds to wait for a dictionary server's health check at startup
    #[arg(long, env = "VULSD_PROBE_TIMEOUT_SECS")]
    pub probe_timeout_secs: Option<u64>,

    /// Seconds each dictionary gets to answer one query
    #[arg(long, env = "VULSD_QUERY_TIMEOUT_SECS")]
    pub query_timeout_secs: Option<u64>,

    /// Debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log every dictionary query statement
    #[arg(long, env = "VULSD_DEBUG_SQL")]
    pub debug_sql: bool,

    /// Log as JSON lines
    #[arg(long, env = "VULSD_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    /// The dictionary settings given on the command line. Unset flags stay
    /// empty so they do not overwrite file values.
    pub fn dictionaries(&self) -> DictionaryConfig {
        DictionaryConfig {
            cve_dict: conf(&self.cvedb_type, &self.cvedb_path, &self.cvedb_url),
            oval_dict: conf(&self.ovaldb_type, &self.ovaldb_path, &self.ovaldb_url),
            gost: conf(&self.gostdb_type, &self.gostdb_path, &self.gostdb_url),
        }
    }
}

fn conf(db_type: &Option<String>, path: &Option<String>, url: &Option<String>) -> DictConf {
    DictConf {
        db_type: db_type.clone().unwrap_or_default(),
        sqlite3_path: path.clone().unwrap_or_default(),
        url: url.clone().unwrap_or_default(),
    }
}
