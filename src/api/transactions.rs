use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::error_response;
use crate::db::AppState;
use crate::models::NewTransaction;
use crate::services::{inventory_service, ledger_service};

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub book_id: Option<String>,
    pub r#type: Option<String>,
    pub volunteer_name: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// GET /api/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<ListTransactionsQuery>,
) -> impl IntoResponse {
    let filter = ledger_service::TransactionFilter {
        book_id: params.book_id,
        r#type: params.r#type,
        volunteer_name: params.volunteer_name,
        date_from: params.date_from,
        date_to: params.date_to,
    };

    match ledger_service::list_transactions(&state.conn, filter).await {
        Ok(transactions) => Json(json!({
            "success": true,
            "data": { "transactions": transactions }
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/transactions/:id
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match ledger_service::get_transaction(&state.conn, &id).await {
        Ok(tx) => Json(json!({ "success": true, "data": tx })).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/transactions - append a donation or sale to the ledger
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(payload): Json<NewTransaction>,
) -> impl IntoResponse {
    match ledger_service::append_transaction(&state.conn, &state.locks, payload).await {
        Ok(tx) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "data": tx })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/transactions/analytics/time-based
pub async fn time_based_analytics(State(state): State<AppState>) -> impl IntoResponse {
    match inventory_service::time_based_analytics(&state.conn).await {
        Ok(analytics) => Json(json!({ "success": true, "data": analytics })).into_response(),
        Err(e) => error_response(e),
    }
}
