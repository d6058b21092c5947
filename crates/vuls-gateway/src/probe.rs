//! Backend probes run before any durable client is opened

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;
use vuls_client::DictClient;
use vuls_core::descriptor::socket_address;
use vuls_core::{BackendDescriptor, HealthReport, HealthStatus, Transport};

/// Default bound for a network liveness check
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Side-effect free health check for one backend
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, descriptor: &BackendDescriptor) -> HealthReport;
}

/// Liveness check for network dictionaries: `GET {endpoint}/health`
pub struct HttpProber {
    timeout: Duration,
    proxy: Option<Url>,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            proxy: None,
        }
    }

    /// Send health checks through an HTTP proxy
    pub fn with_proxy(mut self, proxy: Option<Url>) -> Self {
        self.proxy = proxy;
        self
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, descriptor: &BackendDescriptor) -> HealthReport {
        let kind = descriptor.kind;
        let Transport::Network { endpoint } = &descriptor.transport else {
            return mismatched(descriptor);
        };

        // A throwaway client: the probe must not leave a pooled connection behind.
        let client = match DictClient::from_url(
            endpoint.clone(),
            self.timeout,
            self.timeout,
            self.proxy.as_ref(),
        ) {
            Ok(client) => client,
            Err(e) => {
                return HealthReport::new(
                    kind,
                    endpoint.as_str(),
                    HealthStatus::UnreachableNetwork,
                    e.to_string(),
                )
            }
        };

        match client.health().await {
            Ok(_) => {
                debug!(kind = %kind, endpoint = %endpoint, "Dictionary server is healthy");
                HealthReport::new(
                    kind,
                    endpoint.as_str(),
                    HealthStatus::Reachable,
                    "health check passed",
                )
            }
            Err(e) => HealthReport::new(
                kind,
                endpoint.as_str(),
                HealthStatus::UnreachableNetwork,
                e.to_string(),
            ),
        }
    }
}

/// Lock check for embedded dictionaries
pub struct LockProber;

#[async_trait]
impl Prober for LockProber {
    async fn probe(&self, descriptor: &BackendDescriptor) -> HealthReport {
        match &descriptor.transport {
            Transport::Embedded { path } => vuls_sqlite::check_lock(descriptor.kind, path),
            _ => mismatched(descriptor),
        }
    }
}

/// Reachability check for database connection strings: a bounded TCP
/// connect to the server, closed right away. Credentials are not tried.
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, descriptor: &BackendDescriptor) -> HealthReport {
        let kind = descriptor.kind;
        let Transport::Database { engine, url } = &descriptor.transport else {
            return mismatched(descriptor);
        };
        let target = descriptor.target();
        let Some(address) = socket_address(*engine, url) else {
            return HealthReport::new(
                kind,
                target,
                HealthStatus::UnreachableNetwork,
                "connection string has no host",
            );
        };

        match tokio::time::timeout(self.timeout, TcpStream::connect(address.as_str())).await {
            Ok(Ok(_stream)) => {
                debug!(kind = %kind, engine = %engine, address = %address, "Database server accepts connections");
                HealthReport::new(
                    kind,
                    target,
                    HealthStatus::Reachable,
                    format!("{} accepts connections", address),
                )
            }
            Ok(Err(e)) => HealthReport::new(
                kind,
                target,
                HealthStatus::UnreachableNetwork,
                format!("{} server at {}: {}", engine, address, e),
            ),
            Err(_) => HealthReport::new(
                kind,
                target,
                HealthStatus::UnreachableNetwork,
                format!(
                    "{} server at {} did not accept a connection within {:?}",
                    engine, address, self.timeout
                ),
            ),
        }
    }
}

fn mismatched(descriptor: &BackendDescriptor) -> HealthReport {
    HealthReport::new(
        descriptor.kind,
        descriptor.target(),
        HealthStatus::OpenError,
        "probe does not support this transport",
    )
}

/// Selects the prober for a descriptor by its transport
pub struct ProbeSet {
    http: HttpProber,
    lock: LockProber,
    tcp: TcpProber,
}

impl ProbeSet {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            http: HttpProber::new(probe_timeout),
            lock: LockProber,
            tcp: TcpProber::new(probe_timeout),
        }
    }

    /// Route dictionary server health checks through `proxy`
    pub fn with_http_proxy(mut self, proxy: Option<Url>) -> Self {
        self.http = self.http.with_proxy(proxy);
        self
    }

    pub fn for_transport(&self, transport: &Transport) -> &dyn Prober {
        match transport {
            Transport::Embedded { .. } => &self.lock,
            Transport::Network { .. } => &self.http,
            Transport::Database { .. } => &self.tcp,
        }
    }

    pub async fn probe(&self, descriptor: &BackendDescriptor) -> HealthReport {
        self.for_transport(&descriptor.transport)
            .probe(descriptor)
            .await
    }
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}
