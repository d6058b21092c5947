//! Scan result enrichment handler

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::info;
use vuls_core::{EnrichedResult, ScanResult};

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /vuls`
///
/// Attaches every configured dictionary's documents to the submitted scan
/// result. If the client disconnects, axum drops this future and the
/// in-flight backend lookups with it.
pub async fn enrich(
    State(state): State<AppState>,
    payload: Result<Json<ScanResult>, JsonRejection>,
) -> Result<Json<EnrichedResult>, ApiError> {
    let Json(scan) = payload?;
    let server = scan.server_name.clone();
    let cves = scan.scanned_cves.len();

    let enriched = state.handle().dispatch(scan).await?;

    info!(
        server = %server,
        cves,
        dictionaries = ?enriched.dictionaries,
        warnings = enriched.warnings.len(),
        "Enriched scan result"
    );
    Ok(Json(enriched))
}
