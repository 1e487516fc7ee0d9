use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::error_response;
use crate::db::AppState;
use crate::services::inventory_service;

/// GET /api/inventory/summary
pub async fn summary(State(state): State<AppState>) -> impl IntoResponse {
    match inventory_service::inventory_summary(&state.conn).await {
        Ok(summary) => Json(json!({ "success": true, "data": summary })).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// Trailing window in days, defaults to 30
    pub period: Option<i64>,
}

/// GET /api/inventory/analytics?period=30
pub async fn analytics(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsQuery>,
) -> impl IntoResponse {
    let days = params.period.unwrap_or(30);
    match inventory_service::period_analytics(&state.conn, days).await {
        Ok(analytics) => Json(json!({ "success": true, "data": analytics })).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/inventory/audit - recompute the ledger invariant per book
pub async fn audit(State(state): State<AppState>) -> impl IntoResponse {
    match inventory_service::audit_ledger(&state.conn).await {
        Ok(audit) => Json(json!({ "success": true, "data": audit })).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/inventory/books/multiple-copies
pub async fn multiple_copies(State(state): State<AppState>) -> impl IntoResponse {
    match inventory_service::books_with_multiple_copies(&state.conn).await {
        Ok(books) => Json(json!({ "success": true, "data": books })).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/inventory/books/out-of-stock
pub async fn out_of_stock(State(state): State<AppState>) -> impl IntoResponse {
    match inventory_service::out_of_stock_books(&state.conn).await {
        Ok(books) => Json(json!({ "success": true, "data": books })).into_response(),
        Err(e) => error_response(e),
    }
}
