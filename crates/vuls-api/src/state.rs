//! Application state for the dictionary API

use std::sync::Arc;

use vuls_gateway::AggregateHandle;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Opened backends, shared read-only by every request
    handle: Arc<AggregateHandle>,
}

impl AppState {
    pub fn new(handle: AggregateHandle) -> Self {
        Self::from_shared(Arc::new(handle))
    }

    /// Use a handle the caller keeps a reference to, e.g. to close it after
    /// the server has stopped
    pub fn from_shared(handle: Arc<AggregateHandle>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &AggregateHandle {
        &self.handle
    }
}
