//! Shared harness: a vulsd server running in-process on an ephemeral port

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use vuls_core::{DictConf, DictionaryConfig};
use vuls_sqlite::testing::write_dictionary;
use vulsd::config::ServerSection;
use vulsd::{Args, FileConfig, ServeError, Server, Settings};

/// Documents every test CVE dictionary carries
pub fn cve_documents() -> Vec<(&'static str, Value)> {
    vec![
        (
            "CVE-2021-44228",
            json!({"cvss3": 10.0, "summary": "Apache Log4j2 JNDI RCE"}),
        ),
        (
            "CVE-2014-0160",
            json!({"cvss2": 5.0, "summary": "OpenSSL Heartbleed"}),
        ),
        (
            "CVE-2023-4863",
            json!({"cvss3": 8.8, "summary": "libwebp heap overflow"}),
        ),
    ]
}

/// Write the standard CVE dictionary into `dir`
pub fn cve_dictionary(dir: &Path) -> PathBuf {
    let path = dir.join("cve.sqlite3");
    write_dictionary(&path, &cve_documents()).unwrap();
    path
}

pub fn embedded(path: &Path) -> DictConf {
    DictConf {
        db_type: "sqlite3".to_string(),
        sqlite3_path: path.display().to_string(),
        url: String::new(),
    }
}

pub fn network(url: &str) -> DictConf {
    DictConf {
        db_type: "http".to_string(),
        sqlite3_path: String::new(),
        url: url.to_string(),
    }
}

/// Settings listening on an ephemeral loopback port
pub fn settings(dictionaries: DictionaryConfig, base_dir: &Path) -> Settings {
    settings_with_query_timeout(dictionaries, base_dir, None)
}

pub fn settings_with_query_timeout(
    dictionaries: DictionaryConfig,
    base_dir: &Path,
    query_timeout_secs: Option<u64>,
) -> Settings {
    let file = FileConfig {
        server: ServerSection {
            listen: Some("127.0.0.1:0".to_string()),
            probe_timeout_secs: Some(2),
            query_timeout_secs,
            ..Default::default()
        },
        dictionaries,
    };
    Settings::merge(file, &Args::default(), base_dir.to_path_buf()).unwrap()
}

/// A scan result naming the given CVEs
pub fn scan(ids: &[&str]) -> Value {
    let cves: serde_json::Map<String, Value> = ids
        .iter()
        .map(|id| (id.to_string(), json!({ "cve_id": id })))
        .collect();
    json!({
        "server_name": "web01",
        "family": "debian",
        "release": "12",
        "scanned_cves": cves,
    })
}

/// A server started from settings, stopped gracefully by [`stop`](Self::stop)
pub struct RunningServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServeError>>>,
}

impl RunningServer {
    pub async fn start(settings: &Settings) -> Result<Self, ServeError> {
        let server = Server::bind(settings).await?;
        let addr = server.local_addr().map_err(ServeError::Io)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(server.serve(async move {
            let _ = shutdown_rx.await;
        }));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_vuls(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/vuls"))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Graceful shutdown; returns once every backend is released
    pub async fn stop(mut self) -> Result<(), ServeError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => task.await.unwrap(),
            None => Ok(()),
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
