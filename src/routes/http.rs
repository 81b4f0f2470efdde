// Handlers: version, batch ingestion

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use super::AppState;
use crate::models::{ValidationError, parse_batch};
use crate::storage::{PointWriter, StorageError};
use crate::version::{BUILD, BuildInfo};

/// Upper bound on one batch body.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("empty request body; a JSON batch is required")]
    EmptyBody,
    #[error("unreadable request body: {0}")]
    Body(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IngestError {
    fn status(&self) -> StatusCode {
        match self {
            IngestError::EmptyBody | IngestError::Body(_) | IngestError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            IngestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "ingest failed");
        } else {
            tracing::warn!(error = %self, "ingest rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// GET /version
pub(super) async fn version_handler() -> Json<BuildInfo> {
    Json(BUILD)
}

/// POST /collector/metrics: validate the whole batch, then write every point.
/// Nothing is written unless every record in the batch is well formed.
pub(super) async fn ingest_handler<W: PointWriter>(
    State(state): State<AppState<W>>,
    request: Request,
) -> Result<Json<serde_json::Value>, IngestError> {
    let peer_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let body = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| IngestError::Body(e.to_string()))?;
    if body.is_empty() {
        return Err(IngestError::EmptyBody);
    }

    let mut points = parse_batch(&body)?;
    if let Some(ip) = &peer_ip {
        for p in points.iter_mut().filter(|p| p.tags.remote_ip.is_empty()) {
            p.tags.remote_ip = ip.clone();
        }
    }

    for point in &points {
        state.writer.write_point(point).await?;
    }

    tracing::debug!(
        points = points.len(),
        remote_ip = peer_ip.as_deref().unwrap_or("unknown"),
        "batch written"
    );
    Ok(Json(serde_json::json!({ "written": points.len() })))
}
