//! ClientFactory - builds the aggregate handle from validated descriptors

use std::time::Duration;

use tracing::{error, info, warn};
use url::Url;
use vuls_core::{BackendDescriptor, ConfigError, DictionaryClient, DictionaryKind, Transport};
use vuls_netdb::NetDbOptions;
use vuls_proxy::RemoteDictionary;
use vuls_sqlite::{SqliteDictionary, SqliteOpenError};

use crate::error::StartupError;
use crate::handle::AggregateHandle;
use crate::probe::{ProbeSet, DEFAULT_PROBE_TIMEOUT};

/// Timeouts applied to probes and to the opened clients
#[derive(Debug, Clone)]
pub struct FactoryOptions {
    /// Bound for each network health probe
    pub probe_timeout: Duration,
    /// Bound for each backend's part of a query
    pub query_timeout: Duration,
    /// Connect timeout of network clients
    pub connect_timeout: Duration,
    /// Proxy for dictionary server traffic, probes included
    pub http_proxy: Option<Url>,
    /// Log the statements embedded and database dictionaries run
    pub debug_sql: bool,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            query_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            http_proxy: None,
            debug_sql: false,
        }
    }
}

/// Opens every enabled backend, or none of them
pub struct ClientFactory {
    probes: ProbeSet,
    options: FactoryOptions,
}

impl ClientFactory {
    pub fn new(options: FactoryOptions) -> Self {
        Self {
            probes: ProbeSet::new(options.probe_timeout)
                .with_http_proxy(options.http_proxy.clone()),
            options,
        }
    }

    /// Probe, then open, every descriptor.
    ///
    /// Probing runs sequentially with the CVE dictionary first and stops at
    /// the first failure. Clients opened before a failed open are closed
    /// before the error is returned, so a failed build holds no resources.
    pub async fn build(
        &self,
        descriptors: &[BackendDescriptor],
    ) -> Result<AggregateHandle, StartupError> {
        let mut ordered: Vec<&BackendDescriptor> = descriptors.iter().collect();
        ordered.sort_by_key(|d| d.kind);
        ordered.dedup_by_key(|d| d.kind);
        if ordered.first().map(|d| d.kind) != Some(DictionaryKind::Cve) {
            return Err(ConfigError::CveNotConfigured.into());
        }

        for descriptor in &ordered {
            let report = self.probes.probe(descriptor).await;
            if let Some(err) = StartupError::from_report(report) {
                error!(
                    kind = %descriptor.kind,
                    target = %descriptor.target(),
                    error = %err,
                    "Backend check failed"
                );
                return Err(err);
            }
            info!(kind = %descriptor.kind, target = %descriptor.target(), "Backend check passed");
        }

        let mut opened: Vec<Box<dyn DictionaryClient>> = Vec::with_capacity(ordered.len());
        for descriptor in &ordered {
            match self.open(descriptor).await {
                Ok(client) => opened.push(client),
                Err(err) => {
                    error!(kind = %descriptor.kind, error = %err, "Failed to open backend");
                    rollback(opened);
                    return Err(err);
                }
            }
        }

        Ok(AggregateHandle::new(opened, self.options.query_timeout))
    }

    async fn open(
        &self,
        descriptor: &BackendDescriptor,
    ) -> Result<Box<dyn DictionaryClient>, StartupError> {
        let kind = descriptor.kind;
        match &descriptor.transport {
            Transport::Embedded { path } => match SqliteDictionary::open(kind, path) {
                Ok(dict) => {
                    Ok(Box::new(dict.with_sql_logging(self.options.debug_sql)) as Box<dyn DictionaryClient>)
                }
                Err(SqliteOpenError::Locked { path }) => Err(StartupError::Locked {
                    kind,
                    path: path.display().to_string(),
                }),
                Err(e) => Err(StartupError::Open {
                    kind,
                    target: path.display().to_string(),
                    reason: e.to_string(),
                }),
            },
            Transport::Network { endpoint } => RemoteDictionary::new(
                kind,
                endpoint.clone(),
                self.options.query_timeout,
                self.options.connect_timeout,
                self.options.http_proxy.as_ref(),
            )
            .map(|dict| Box::new(dict) as Box<dyn DictionaryClient>)
            .map_err(|e| StartupError::Open {
                kind,
                target: descriptor.target(),
                reason: e.to_string(),
            }),
            Transport::Database { engine, url } => {
                let options = NetDbOptions {
                    connect_timeout: self.options.connect_timeout,
                    log_statements: self.options.debug_sql,
                    ..Default::default()
                };
                vuls_netdb::connect(kind, *engine, url, descriptor.target(), &options)
                    .await
                    .map_err(|e| StartupError::Open {
                        kind,
                        target: descriptor.target(),
                        reason: e.to_string(),
                    })
            }
        }
    }
}

/// Close clients opened during a failed build, newest first
fn rollback(opened: Vec<Box<dyn DictionaryClient>>) {
    for client in opened.into_iter().rev() {
        warn!(
            kind = %client.kind(),
            target = %client.target(),
            "Closing backend after failed startup"
        );
        drop(client);
    }
}
