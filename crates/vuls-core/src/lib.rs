//! vuls-core - Core traits and types for vulnerability dictionary backends
//!
//! This crate provides the abstractions shared by every dictionary transport
//! (embedded SQLite files, remote dictionary servers) and by the HTTP layer
//! that serves enrichment queries on top of them.

pub mod backend;
pub mod descriptor;
pub mod error;
pub mod health;
pub mod models;

pub use backend::DictionaryClient;
pub use descriptor::{
    resolve, BackendDescriptor, DbEngine, DictConf, DictionaryConfig, DictionaryKind, Transport,
};
pub use error::{BackendError, BackendResult, ConfigError};
pub use health::{HealthReport, HealthStatus};
pub use models::*;
