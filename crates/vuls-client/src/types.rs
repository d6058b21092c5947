//! Wire types of the dictionary server API

use serde::{Deserialize, Serialize};

/// Body of `POST /cves`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRequest {
    #[serde(rename = "cveIDs")]
    pub cve_ids: Vec<String>,
}

/// Error body returned by dictionary servers
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}
