//! vuls-gateway - Dictionary backend coordination
//!
//! This crate turns validated backend descriptors into one shared
//! [`AggregateHandle`] and fans every enrichment query out over it.
//!
//! # Architecture
//!
//! ```text
//!  BackendDescriptor (cve, oval?, gost?)
//!          │
//!          ▼
//!  ┌──────────────┐   network   ┌─────────────┐
//!  │   ProbeSet   │────────────▶│ HttpProber  │  GET /health, bounded timeout
//!  │              │   embedded  ├─────────────┤
//!  │              │────────────▶│ LockProber  │  non-blocking file and db lock
//!  │              │   database  ├─────────────┤
//!  │              │────────────▶│ TcpProber   │  bounded TCP connect
//!  └──────┬───────┘             └─────────────┘
//!         │ all healthy
//!         ▼
//!  ┌──────────────┐  opens  SqliteDictionary / RemoteDictionary /
//!  │ClientFactory │──────▶  SqlDictionary / RedisDictionary
//!  │              │         (rollback-close on any failure)
//!  └──────┬───────┘
//!         ▼
//!  ┌──────────────────┐  per request: concurrent lookup on every client,
//!  │ AggregateHandle  │  CVE failure fails the request, others degrade
//!  └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use vuls_gateway::{ClientFactory, FactoryOptions};
//!
//! let descriptors = config.resolve_all(&base_dir)?;
//! let handle = ClientFactory::new(FactoryOptions::default())
//!     .build(&descriptors)
//!     .await?;
//! let enriched = handle.dispatch(scan_result).await?;
//! handle.close();
//! ```

mod error;
mod factory;
mod handle;
mod probe;

pub use error::{DispatchError, StartupError};
pub use factory::{ClientFactory, FactoryOptions};
pub use handle::AggregateHandle;
pub use probe::{HttpProber, LockProber, ProbeSet, Prober, TcpProber};

// Re-export core types for convenience
pub use vuls_core::{
    BackendDescriptor, DictionaryClient, DictionaryKind, HealthReport, HealthStatus,
};
