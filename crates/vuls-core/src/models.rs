//! Query payloads exchanged over `/vuls`

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::descriptor::DictionaryKind;

/// A scan result submitted for enrichment.
///
/// Keys are accepted in snake_case and in the camelCase a Vuls scanner
/// writes (`serverName`, `scannedCves`, `cveID`, ...). Responses use
/// snake_case. Fields this server does not know about are carried through
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(default, alias = "serverName")]
    pub server_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, alias = "reportedAt", skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<DateTime<Utc>>,
    /// Detected CVEs keyed by CVE ID
    #[serde(default, alias = "scannedCves")]
    pub scanned_cves: BTreeMap<String, VulnInfo>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ScanResult {
    /// CVE IDs to look up, sorted and de-duplicated
    pub fn cve_ids(&self) -> Vec<String> {
        let ids: BTreeSet<&str> = self
            .scanned_cves
            .iter()
            .map(|(key, info)| {
                if info.cve_id.is_empty() {
                    key.as_str()
                } else {
                    info.cve_id.as_str()
                }
            })
            .collect();
        ids.into_iter().map(str::to_string).collect()
    }
}

/// One detected vulnerability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnInfo {
    #[serde(default, alias = "cveID")]
    pub cve_id: String,
    #[serde(default, alias = "affectedPackages", skip_serializing_if = "Vec::is_empty")]
    pub affected_packages: Vec<serde_json::Value>,
    /// Dictionary documents keyed by dictionary kind
    #[serde(default, alias = "cveContents")]
    pub cve_contents: BTreeMap<DictionaryKind, serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An optional backend failed while answering a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialBackendError {
    pub kind: DictionaryKind,
    pub message: String,
}

/// Response of `/vuls`
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedResult {
    #[serde(flatten)]
    pub result: ScanResult,
    pub enriched_at: DateTime<Utc>,
    /// Dictionaries that contributed to this result
    pub dictionaries: Vec<DictionaryKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PartialBackendError>,
}
