//! vuls-api - HTTP API layer for the dictionary server
//!
//! Serves scan result enrichment over an already built
//! [`AggregateHandle`](vuls_gateway::AggregateHandle). The router never
//! opens, probes or closes backends itself.
//!
//! # Usage
//!
//! ```ignore
//! use vuls_api::{create_router, AppState};
//!
//! let handle = ClientFactory::new(options).build(&descriptors).await?;
//! let router = create_router(AppState::new(handle));
//! axum::serve(listener, router).await?;
//! ```

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the `/vuls` + `/health` router with the given application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Liveness only; backends were checked once at startup
        .route("/health", get(handlers::health::health))
        .route("/vuls", post(handlers::vuls::enrich))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
