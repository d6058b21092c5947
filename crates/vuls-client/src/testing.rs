//! Test utilities for vuls-client
//!
//! Provides an in-process server harness and a fake dictionary server for
//! integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use crate::types::LookupRequest;
use crate::{DictClient, Result};

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: DictClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
    lookups: Arc<AtomicUsize>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    pub async fn start(router: Router) -> Result<Self> {
        Self::start_with_timeout(router, Duration::from_secs(5), Duration::from_secs(2)).await
    }

    /// Create a new test server with custom client timeouts
    pub async fn start_with_timeout(
        router: Router,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        let base_url = format!("http://{}", addr);
        let client = DictClient::with_config(&base_url, timeout, connect_timeout)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            lookups: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of `/cves` requests served so far (for servers started by `FakeDictionary`)
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// A go-cve-dictionary style server with canned documents
#[derive(Clone, Default)]
pub struct FakeDictionary {
    entries: Arc<HashMap<String, serde_json::Value>>,
    health_status: Option<StatusCode>,
    lookup_status: Option<StatusCode>,
    lookup_delay: Option<Duration>,
    lookups: Arc<AtomicUsize>,
}

impl FakeDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `document` for `cve_id`
    pub fn with_entry(mut self, cve_id: &str, document: serde_json::Value) -> Self {
        Arc::make_mut(&mut self.entries).insert(cve_id.to_string(), document);
        self
    }

    /// Answer `/health` with this status instead of 200
    pub fn with_health_status(mut self, status: StatusCode) -> Self {
        self.health_status = Some(status);
        self
    }

    /// Answer `/cves` with this status instead of 200
    pub fn with_lookup_status(mut self, status: StatusCode) -> Self {
        self.lookup_status = Some(status);
        self
    }

    /// Sleep before answering `/cves`
    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    /// Number of `/cves` requests served so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(fake_health))
            .route("/cves", post(fake_lookup))
            .with_state(self.clone())
    }

    /// Start the fake dictionary on an ephemeral port
    pub async fn start(&self) -> Result<TestServer> {
        let mut server = TestServer::start(self.router()).await?;
        server.lookups = self.lookups.clone();
        Ok(server)
    }
}

async fn fake_health(State(dict): State<FakeDictionary>) -> (StatusCode, &'static str) {
    match dict.health_status {
        Some(status) => (status, "unhealthy"),
        None => (StatusCode::OK, "ok"),
    }
}

async fn fake_lookup(
    State(dict): State<FakeDictionary>,
    Json(request): Json<LookupRequest>,
) -> std::result::Result<Json<HashMap<String, serde_json::Value>>, StatusCode> {
    dict.lookups.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = dict.lookup_delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = dict.lookup_status {
        return Err(status);
    }

    let found = request
        .cve_ids
        .iter()
        .filter_map(|id| dict.entries.get(id).map(|doc| (id.clone(), doc.clone())))
        .collect();
    Ok(Json(found))
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
