pub mod books;
pub mod health;
pub mod inventory;
pub mod sync;
pub mod transactions;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::db::AppState;
use crate::domain::DomainError;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/isbn/:isbn", get(books::get_book_by_isbn))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/transactions", get(books::book_transactions))
        // Ledger
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route(
            "/transactions/analytics/time-based",
            get(transactions::time_based_analytics),
        )
        .route("/transactions/:id", get(transactions::get_transaction))
        // Sync
        .route("/sync/upload", axum::routing::post(sync::upload))
        .route("/sync/download", get(sync::download))
        .route("/sync/status", get(sync::status))
        // Inventory analytics
        .route("/inventory/summary", get(inventory::summary))
        .route("/inventory/analytics", get(inventory::analytics))
        .route("/inventory/audit", get(inventory::audit))
        .route(
            "/inventory/books/multiple-copies",
            get(inventory::multiple_copies),
        )
        .route(
            "/inventory/books/out-of-stock",
            get(inventory::out_of_stock),
        )
        .with_state(state)
}

/// Map the domain error taxonomy onto HTTP statuses. Wire-level message
/// text is informational only.
pub(crate) fn error_response(err: DomainError) -> Response {
    let status = match &err {
        DomainError::InvalidArgument(_) | DomainError::InsufficientStock => {
            StatusCode::BAD_REQUEST
        }
        DomainError::NotFound => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::Internal(msg) => {
            tracing::error!("internal error: {}", msg);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(json!({
            "success": false,
            "error": { "message": err.to_string() }
        })),
    )
        .into_response()
}
