//! API server state

use std::sync::Arc;

use crate::store::RowStore;

/// API server state
#[derive(Clone)]
pub struct AppState {
    /// Row store shared by all requests
    pub store: Arc<dyn RowStore>,

    /// Backend name reported by the health endpoint
    pub backend: &'static str,
}

impl AppState {
    pub fn new(store: Arc<dyn RowStore>, backend: &'static str) -> Self {
        Self { store, backend }
    }
}
