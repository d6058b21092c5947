//! vulsd - Vulnerability dictionary server
//!
//! Startup is strictly sequential: resolve descriptors, probe every backend,
//! open the aggregate handle, and only then bind the listener. Any failure
//! before the bind ends the process without ever accepting a connection.

pub mod cli;
pub mod config;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use vuls_api::{create_router, AppState};
use vuls_gateway::{AggregateHandle, ClientFactory, StartupError};

pub use cli::Args;
pub use config::{FileConfig, Settings};

/// Why the server stopped with a failure
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[source] std::io::Error),
}

impl ServeError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            ServeError::Startup(StartupError::Config(_)) => 2,
            ServeError::Startup(_) => 3,
            ServeError::Bind { .. } => 4,
            ServeError::Io(_) => 1,
        }
    }

    /// Operator advice, when there is any
    pub fn remediation(&self) -> Option<String> {
        match self {
            ServeError::Startup(e) => Some(e.remediation()),
            ServeError::Bind { .. } => {
                Some("Stop the process using the listen address or choose another --listen.".into())
            }
            ServeError::Io(_) => None,
        }
    }
}

/// A bound server holding its backends, not yet accepting connections
pub struct Server {
    listener: TcpListener,
    handle: Arc<AggregateHandle>,
}

impl Server {
    /// Resolve, probe and open every backend, then bind the listen address
    pub async fn bind(settings: &Settings) -> Result<Self, ServeError> {
        let descriptors = settings
            .dictionaries
            .resolve_all(&settings.base_dir)
            .map_err(StartupError::from)?;

        let handle = ClientFactory::new(settings.options.clone())
            .build(&descriptors)
            .await?;

        // The handle is released by drop if binding fails.
        let listener = TcpListener::bind(&settings.listen)
            .await
            .map_err(|source| ServeError::Bind {
                addr: settings.listen.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            handle: Arc::new(handle),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` completes, then release the backends
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self { listener, handle } = self;
        if let Ok(addr) = listener.local_addr() {
            info!("Listening on http://{}", addr);
        }

        let app = create_router(AppState::from_shared(Arc::clone(&handle)));
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServeError::Io);

        // Every request clone of the state is gone once serve returns.
        match Arc::try_unwrap(handle) {
            Ok(handle) => handle.close(),
            Err(_) => warn!("Dictionary backends still in use, releasing with the last request"),
        }
        result
    }
}

/// Run the server until Ctrl-C or SIGTERM
pub async fn run(settings: Settings) -> Result<(), ServeError> {
    let server = Server::bind(&settings).await?;
    server.serve(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

/// Completes on Ctrl-C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
