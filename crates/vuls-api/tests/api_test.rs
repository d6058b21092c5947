//! HTTP tests for the /vuls and /health routes
//!
//! The router is served in-process by vuls-client's TestServer and exercised
//! with plain reqwest requests.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};
use vuls_api::{create_router, AppState};
use vuls_client::testing::TestServer;
use vuls_core::{BackendError, BackendResult, DictionaryClient, DictionaryKind};
use vuls_gateway::AggregateHandle;
use vuls_sqlite::testing::write_dictionary;
use vuls_sqlite::SqliteDictionary;

// =============================================================================
// Mock Backend
// =============================================================================

/// Backend that always fails with a transport error
struct BrokenDictionary(DictionaryKind);

#[async_trait::async_trait]
impl DictionaryClient for BrokenDictionary {
    fn kind(&self) -> DictionaryKind {
        self.0
    }

    fn target(&self) -> String {
        "http://127.0.0.1:1/".to_string()
    }

    async fn lookup(&self, _cve_ids: &[String]) -> BackendResult<HashMap<String, Value>> {
        Err(BackendError::Transport("connection refused".to_string()))
    }
}

fn cve_dictionary(dir: &Path) -> Box<dyn DictionaryClient> {
    let path = dir.join("cve.sqlite3");
    write_dictionary(
        &path,
        &[
            ("CVE-2021-44228", json!({"cvss3": 10.0, "summary": "Log4Shell"})),
            ("CVE-2014-0160", json!({"cvss2": 5.0, "summary": "Heartbleed"})),
        ],
    )
    .unwrap();
    Box::new(SqliteDictionary::open(DictionaryKind::Cve, &path).unwrap())
}

async fn serve(clients: Vec<Box<dyn DictionaryClient>>) -> TestServer {
    let handle = AggregateHandle::new(clients, Duration::from_secs(5));
    TestServer::start(create_router(AppState::new(handle)))
        .await
        .unwrap()
}

fn scan() -> Value {
    json!({
        "server_name": "web01",
        "family": "ubuntu",
        "release": "22.04",
        "scanned_cves": {
            "CVE-2021-44228": { "cve_id": "CVE-2021-44228" },
            "CVE-2014-0160": {}
        },
        "ip_v4_addrs": ["10.0.0.5"]
    })
}

#[tokio::test]
async fn test_health_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve(vec![cve_dictionary(dir.path())]).await;

    let response = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_vuls_enriches_scan_result() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve(vec![cve_dictionary(dir.path())]).await;

    let response = reqwest::Client::new()
        .post(format!("{}/vuls", server.base_url()))
        .json(&scan())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let cves = &body["scanned_cves"];
    assert_eq!(
        cves["CVE-2021-44228"]["cve_contents"]["cve"]["summary"],
        "Log4Shell"
    );
    assert_eq!(
        cves["CVE-2014-0160"]["cve_contents"]["cve"]["summary"],
        "Heartbleed"
    );
    assert_eq!(body["ip_v4_addrs"], json!(["10.0.0.5"]));
    assert_eq!(body["dictionaries"], json!(["cve"]));
    assert!(body.get("warnings").is_none());
    assert!(body["enriched_at"].is_string());
}

#[tokio::test]
async fn test_vuls_reports_optional_backend_failure() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve(vec![
        cve_dictionary(dir.path()),
        Box::new(BrokenDictionary(DictionaryKind::Oval)),
    ])
    .await;

    let body: Value = reqwest::Client::new()
        .post(format!("{}/vuls", server.base_url()))
        .json(&scan())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["dictionaries"], json!(["cve"]));
    assert_eq!(body["warnings"][0]["kind"], "oval");
    assert!(body["warnings"][0]["message"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn test_vuls_unavailable_when_cve_backend_fails() {
    let server = serve(vec![Box::new(BrokenDictionary(DictionaryKind::Cve))]).await;

    let response = reqwest::Client::new()
        .post(format!("{}/vuls", server.base_url()))
        .json(&scan())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "service_unavailable");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("cve dictionary unavailable"));
}

#[tokio::test]
async fn test_vuls_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve(vec![cve_dictionary(dir.path())]).await;

    let response = reqwest::Client::new()
        .post(format!("{}/vuls", server.base_url()))
        .header("content-type", "application/json")
        .body("{\"server_name\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_vuls_requires_json_content_type() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve(vec![cve_dictionary(dir.path())]).await;

    let response = reqwest::Client::new()
        .post(format!("{}/vuls", server.base_url()))
        .body(scan().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 415);
}

#[tokio::test]
async fn test_health_does_not_touch_backends() {
    // Even with a broken mandatory backend, liveness stays green.
    let server = serve(vec![Box::new(BrokenDictionary(DictionaryKind::Cve))]).await;

    let response = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}
