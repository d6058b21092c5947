//! Health and lock probe results

use std::fmt;

use serde::Serialize;

use crate::descriptor::DictionaryKind;

/// Classification of a single backend probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Reachable,
    UnreachableNetwork,
    LockedByOtherProcess,
    OpenError,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Reachable => "reachable",
            HealthStatus::UnreachableNetwork => "unreachable",
            HealthStatus::LockedByOtherProcess => "locked",
            HealthStatus::OpenError => "open error",
        };
        f.write_str(s)
    }
}

/// Outcome of probing one backend. Consumed immediately by startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub kind: DictionaryKind,
    /// Path or endpoint that was probed
    pub target: String,
    pub status: HealthStatus,
    /// Underlying error text, or a short confirmation when reachable
    pub diagnostic: String,
}

impl HealthReport {
    pub fn new(
        kind: DictionaryKind,
        target: impl Into<String>,
        status: HealthStatus,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            target: target.into(),
            status,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Reachable
    }
}
