//! End-to-end tests for the vulsd server lifecycle
//!
//! Run with: cargo test --test server_e2e_test

mod common;

use std::net::TcpListener;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};
use vuls_client::testing::FakeDictionary;
use vuls_core::{DictionaryConfig, DictionaryKind, HealthStatus};
use vuls_gateway::StartupError;
use vuls_sqlite::testing::write_dictionary;
use vuls_sqlite::{check_lock, SqliteDictionary};
use vulsd::config::ServerSection;
use vulsd::{Args, FileConfig, ServeError, Server, Settings};

use common::{cve_dictionary, embedded, network, scan, settings, RunningServer};

// =============================================================================
// Healthy startup
// =============================================================================

#[tokio::test]
async fn test_cve_only_server_answers_health_and_vuls() {
    let dir = tempfile::tempdir().unwrap();
    let cve = cve_dictionary(dir.path());
    let config = DictionaryConfig {
        cve_dict: embedded(&cve),
        ..Default::default()
    };

    let server = RunningServer::start(&settings(config, dir.path()))
        .await
        .unwrap();

    let health = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await.unwrap(), "ok");

    let response = server
        .post_vuls(&scan(&["CVE-2021-44228", "CVE-2014-0160", "CVE-1999-0001"]))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["server_name"], "web01");
    assert_eq!(body["family"], "debian");
    assert_eq!(body["dictionaries"], json!(["cve"]));
    let cves = &body["scanned_cves"];
    assert_eq!(cves["CVE-2021-44228"]["cve_contents"]["cve"]["cvss3"], 10.0);
    assert_eq!(
        cves["CVE-2014-0160"]["cve_contents"]["cve"]["summary"],
        "OpenSSL Heartbleed"
    );
    // Unknown to the dictionary: passed through without contents
    assert_eq!(cves["CVE-1999-0001"]["cve_contents"], json!({}));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_graceful_stop_releases_dictionary_lock() {
    let dir = tempfile::tempdir().unwrap();
    let cve = cve_dictionary(dir.path());
    let config = DictionaryConfig {
        cve_dict: embedded(&cve),
        ..Default::default()
    };

    let server = RunningServer::start(&settings(config, dir.path()))
        .await
        .unwrap();
    assert_eq!(
        check_lock(DictionaryKind::Cve, &cve).status,
        HealthStatus::LockedByOtherProcess
    );

    server.stop().await.unwrap();
    assert_eq!(
        check_lock(DictionaryKind::Cve, &cve).status,
        HealthStatus::Reachable
    );
}

#[tokio::test]
async fn test_default_sqlite3_file_in_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    cve_dictionary(dir.path());

    // No CVE settings at all: type defaults to sqlite3 and the file to cve.sqlite3
    let server = RunningServer::start(&settings(DictionaryConfig::default(), dir.path()))
        .await
        .unwrap();

    let body: Value = server
        .post_vuls(&scan(&["CVE-2023-4863"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(
        body["scanned_cves"]["CVE-2023-4863"]["cve_contents"]["cve"]["cvss3"],
        8.8
    );
}

#[tokio::test]
async fn test_config_file_with_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    cve_dictionary(dir.path());
    write_dictionary(
        &dir.path().join("gost.sqlite3"),
        &[("CVE-2021-44228", json!({"debian": {"status": "resolved"}}))],
    )
    .unwrap();

    let path = dir.path().join("vulsd.toml");
    std::fs::write(
        &path,
        r#"
[server]
listen = "127.0.0.1:0"

[cveDict]
type = "sqlite3"
SQLite3Path = "cve.sqlite3"

[gost]
type = "sqlite3"
"#,
    )
    .unwrap();

    let file = FileConfig::load(&path).unwrap();
    let settings = Settings::merge(file, &Args::default(), dir.path().to_path_buf()).unwrap();
    let server = RunningServer::start(&settings).await.unwrap();

    let body: Value = server
        .post_vuls(&scan(&["CVE-2021-44228"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["dictionaries"], json!(["cve", "gost"]));
    assert_eq!(
        body["scanned_cves"]["CVE-2021-44228"]["cve_contents"]["gost"]["debian"]["status"],
        "resolved"
    );
}

// =============================================================================
// Startup failures
// =============================================================================

#[tokio::test]
async fn test_locked_cve_fails_before_binding() {
    let dir = tempfile::tempdir().unwrap();
    let cve = cve_dictionary(dir.path());
    let _holder = SqliteDictionary::open(DictionaryKind::Cve, &cve).unwrap();

    let free = TcpListener::bind("127.0.0.1:0").unwrap();
    let listen = free.local_addr().unwrap().to_string();
    drop(free);

    let file = FileConfig {
        server: ServerSection {
            listen: Some(listen.clone()),
            ..Default::default()
        },
        dictionaries: DictionaryConfig {
            cve_dict: embedded(&cve),
            ..Default::default()
        },
    };
    let settings = Settings::merge(file, &Args::default(), dir.path().to_path_buf()).unwrap();

    let err = Server::bind(&settings).await.err().unwrap();
    match &err {
        ServeError::Startup(StartupError::Locked { kind, path }) => {
            assert_eq!(*kind, DictionaryKind::Cve);
            assert_eq!(path, &cve.display().to_string());
        }
        other => panic!("expected locked error, got {}", other),
    }
    assert_eq!(err.exit_code(), 3);
    assert!(TcpListener::bind(&listen).is_ok(), "listen address was bound");
}

#[tokio::test]
async fn test_cve_server_500_fails_startup() {
    let dict = FakeDictionary::new()
        .with_health_status(StatusCode::INTERNAL_SERVER_ERROR)
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = DictionaryConfig {
        cve_dict: network(&dict.base_url()),
        ..Default::default()
    };

    let err = Server::bind(&settings(config, dir.path()))
        .await
        .err()
        .unwrap();

    match &err {
        ServeError::Startup(StartupError::Unreachable { kind, endpoint, reason }) => {
            assert_eq!(*kind, DictionaryKind::Cve);
            assert!(endpoint.contains(&dict.addr.to_string()));
            assert!(reason.contains("500"), "got {}", reason);
        }
        other => panic!("expected unreachable error, got {}", other),
    }
}

#[tokio::test]
async fn test_missing_optional_dictionary_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let cve = cve_dictionary(dir.path());
    let config = DictionaryConfig {
        cve_dict: embedded(&cve),
        oval_dict: embedded(&dir.path().join("oval.sqlite3")),
        ..Default::default()
    };

    let err = Server::bind(&settings(config, dir.path()))
        .await
        .err()
        .unwrap();

    assert!(matches!(
        err,
        ServeError::Startup(StartupError::Open {
            kind: DictionaryKind::Oval,
            ..
        })
    ));
    assert_eq!(
        check_lock(DictionaryKind::Cve, &cve).status,
        HealthStatus::Reachable
    );
}

#[tokio::test]
async fn test_cve_file_being_written_fails_before_binding() {
    let dir = tempfile::tempdir().unwrap();
    let cve = cve_dictionary(dir.path());
    let writer = rusqlite::Connection::open(&cve).unwrap();
    writer.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let config = DictionaryConfig {
        cve_dict: embedded(&cve),
        ..Default::default()
    };
    let err = Server::bind(&settings(config, dir.path()))
        .await
        .err()
        .unwrap();

    assert!(
        matches!(err, ServeError::Startup(StartupError::Locked { .. })),
        "got {}",
        err
    );
    assert_eq!(err.exit_code(), 3);
}

// =============================================================================
// Vuls scanner payloads
// =============================================================================

#[tokio::test]
async fn test_camel_case_scan_result_is_enriched() {
    let dir = tempfile::tempdir().unwrap();
    let cve = cve_dictionary(dir.path());
    let config = DictionaryConfig {
        cve_dict: embedded(&cve),
        ..Default::default()
    };
    let server = RunningServer::start(&settings(config, dir.path()))
        .await
        .unwrap();

    let response = server
        .post_vuls(&json!({
            "serverName": "db01",
            "family": "ubuntu",
            "scannedCves": {
                "CVE-2014-0160": {
                    "cveID": "CVE-2014-0160",
                    "affectedPackages": [{"name": "openssl"}]
                }
            }
        }))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["server_name"], "db01");
    let info = &body["scanned_cves"]["CVE-2014-0160"];
    assert_eq!(info["cve_contents"]["cve"]["summary"], "OpenSSL Heartbleed");
    assert_eq!(info["affected_packages"][0]["name"], "openssl");
    server.stop().await.unwrap();
}

// =============================================================================
// Degraded queries
// =============================================================================

#[tokio::test]
async fn test_optional_backend_failure_is_reported_per_request() {
    let dir = tempfile::tempdir().unwrap();
    let cve = cve_dictionary(dir.path());
    let oval = FakeDictionary::new()
        .with_entry("CVE-2021-44228", json!({"definition_id": "oval:org.debian:def:1"}))
        .start()
        .await
        .unwrap();
    let gost = FakeDictionary::new()
        .with_lookup_status(StatusCode::INTERNAL_SERVER_ERROR)
        .start()
        .await
        .unwrap();

    let config = DictionaryConfig {
        cve_dict: embedded(&cve),
        oval_dict: network(&oval.base_url()),
        gost: network(&gost.base_url()),
    };
    let server = RunningServer::start(&settings(config, dir.path()))
        .await
        .unwrap();

    let response = server.post_vuls(&scan(&["CVE-2021-44228"])).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();

    let contents = &body["scanned_cves"]["CVE-2021-44228"]["cve_contents"];
    assert_eq!(contents["cve"]["cvss3"], 10.0);
    assert_eq!(contents["oval"]["definition_id"], "oval:org.debian:def:1");
    assert!(contents.get("gost").is_none());
    assert_eq!(body["dictionaries"], json!(["cve", "oval"]));
    assert_eq!(body["warnings"][0]["kind"], "gost");
    assert!(body["warnings"][0]["message"]
        .as_str()
        .unwrap()
        .contains("500"));
}

#[tokio::test]
async fn test_slow_optional_backend_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let cve = cve_dictionary(dir.path());
    let oval = FakeDictionary::new()
        .with_lookup_delay(Duration::from_secs(5))
        .start()
        .await
        .unwrap();

    let config = DictionaryConfig {
        cve_dict: embedded(&cve),
        oval_dict: network(&oval.base_url()),
        ..Default::default()
    };
    let settings = common::settings_with_query_timeout(config, dir.path(), Some(1));
    let server = RunningServer::start(&settings).await.unwrap();

    let started = std::time::Instant::now();
    let body: Value = server
        .post_vuls(&scan(&["CVE-2014-0160"]))
        .await
        .json()
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(body["dictionaries"], json!(["cve"]));
    assert_eq!(body["warnings"][0]["kind"], "oval");
}

#[tokio::test]
async fn test_failing_cve_server_returns_503_and_keeps_serving() {
    let cve = FakeDictionary::new()
        .with_lookup_status(StatusCode::BAD_GATEWAY)
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = DictionaryConfig {
        cve_dict: network(&cve.base_url()),
        ..Default::default()
    };
    let server = RunningServer::start(&settings(config, dir.path()))
        .await
        .unwrap();

    for _ in 0..3 {
        let response = server.post_vuls(&scan(&["CVE-2021-44228"])).await;
        assert_eq!(response.status(), 503);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "service_unavailable");
    }
    assert_eq!(cve.lookup_count(), 3);

    let health = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
}

#[tokio::test]
async fn test_empty_scan_skips_backends() {
    let cve = FakeDictionary::new().start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = DictionaryConfig {
        cve_dict: network(&cve.base_url()),
        ..Default::default()
    };
    let server = RunningServer::start(&settings(config, dir.path()))
        .await
        .unwrap();

    let response = server.post_vuls(&scan(&[])).await;
    assert_eq!(response.status(), 200);
    assert_eq!(cve.lookup_count(), 0);
}
