use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::error_response;
use crate::db::AppState;
use crate::domain::DomainError;
use crate::services::sync_service::{self, SyncUpload};

/// POST /api/sync/upload - merge an offline client's batch
pub async fn upload(
    State(state): State<AppState>,
    Json(payload): Json<SyncUpload>,
) -> impl IntoResponse {
    match sync_service::upload_merge(&state.conn, &state.locks, payload).await {
        Ok(report) => Json(json!({ "success": true, "data": report })).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub since: Option<String>,
}

/// GET /api/sync/download?since=... - server-side changes past a watermark
pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<DownloadQuery>,
) -> impl IntoResponse {
    // An absent watermark is a caller error, not a full-sync request
    let since = match params.since {
        Some(since) => since,
        None => {
            return error_response(DomainError::InvalidArgument(
                "since parameter is required".to_string(),
            ))
        }
    };

    match sync_service::download_delta(&state.conn, &since).await {
        Ok(delta) => Json(json!({ "success": true, "data": delta })).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/sync/status
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    match sync_service::sync_status(&state.conn).await {
        Ok(status) => Json(json!({ "success": true, "data": status })).into_response(),
        Err(e) => error_response(e),
    }
}
