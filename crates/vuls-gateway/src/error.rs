//! Startup and dispatch errors

use thiserror::Error;
use vuls_core::{ConfigError, DictionaryKind, HealthReport, HealthStatus};

/// Why the service refuses to start. All variants are fatal.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{kind} dictionary at {endpoint} is unreachable: {reason}")]
    Unreachable {
        kind: DictionaryKind,
        endpoint: String,
        reason: String,
    },

    #[error("{kind} dictionary {path} is locked by another process")]
    Locked { kind: DictionaryKind, path: String },

    #[error("{kind} dictionary {target} cannot be opened: {reason}")]
    Open {
        kind: DictionaryKind,
        target: String,
        reason: String,
    },
}

impl StartupError {
    /// Convert a failed probe into the matching error. `None` when healthy.
    pub fn from_report(report: HealthReport) -> Option<Self> {
        let HealthReport {
            kind,
            target,
            status,
            diagnostic,
        } = report;

        match status {
            HealthStatus::Reachable => None,
            HealthStatus::UnreachableNetwork => Some(Self::Unreachable {
                kind,
                endpoint: target,
                reason: diagnostic,
            }),
            HealthStatus::LockedByOtherProcess => Some(Self::Locked { kind, path: target }),
            HealthStatus::OpenError => Some(Self::Open {
                kind,
                target,
                reason: diagnostic,
            }),
        }
    }

    /// Backend the error is about, if any
    pub fn kind(&self) -> Option<DictionaryKind> {
        match self {
            Self::Config(_) => None,
            Self::Unreachable { kind, .. } | Self::Locked { kind, .. } | Self::Open { kind, .. } => {
                Some(*kind)
            }
        }
    }

    /// What the operator should do about it
    pub fn remediation(&self) -> String {
        match self {
            Self::Config(_) => {
                "Fix the dictionary settings in the flags or config file and restart.".to_string()
            }
            Self::Unreachable { kind, endpoint, .. } if !endpoint.starts_with("http") => format!(
                "Start the database server at {} or fix --{}-url.",
                endpoint,
                flag_prefix(*kind)
            ),
            Self::Unreachable { kind, .. } => format!(
                "Run {} as server mode before starting, or use --{}-path to read a local database.",
                server_name(*kind),
                flag_prefix(*kind)
            ),
            Self::Locked { path, .. } => format!(
                "SQLite3 is locked. Stop the other process using {} and try again.",
                path
            ),
            Self::Open { target, .. } => format!(
                "Check that {} exists, is readable, and is a dictionary database.",
                target
            ),
        }
    }
}

fn server_name(kind: DictionaryKind) -> &'static str {
    match kind {
        DictionaryKind::Cve => "go-cve-dictionary",
        DictionaryKind::Oval => "goval-dictionary",
        DictionaryKind::Gost => "gost",
    }
}

fn flag_prefix(kind: DictionaryKind) -> &'static str {
    match kind {
        DictionaryKind::Cve => "cvedb",
        DictionaryKind::Oval => "ovaldb",
        DictionaryKind::Gost => "gostdb",
    }
}

/// A query could not be answered at all
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The mandatory dictionary failed for this request
    #[error("{kind} dictionary unavailable: {reason}")]
    MandatoryBackend { kind: DictionaryKind, reason: String },
}
