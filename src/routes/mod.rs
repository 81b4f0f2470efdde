// Collector HTTP routes

mod http;

pub use http::IngestError;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::storage::PointWriter;

/// Path the sender posts batches to.
pub const METRICS_PATH: &str = "/collector/metrics";

pub(crate) struct AppState<W> {
    pub(crate) writer: Arc<W>,
}

impl<W> Clone for AppState<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

pub fn app<W: PointWriter + 'static>(writer: Arc<W>) -> Router {
    let state = AppState { writer };
    Router::new()
        .route("/", get(|| async { "dockmon collector" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route(METRICS_PATH, post(http::ingest_handler::<W>)) // POST /collector/metrics
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
