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
use crate::models::Book;
use crate::services::{book_service, ledger_service};

#[derive(Debug, Deserialize)]
pub struct ListBooksQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub available_only: bool,
}

/// GET /api/books
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<ListBooksQuery>,
) -> impl IntoResponse {
    let filter = book_service::BookFilter {
        search: params.search,
        available_only: params.available_only,
    };

    match book_service::list_books(&state.conn, filter).await {
        Ok(books) => Json(json!({ "success": true, "data": { "books": books } })).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/books/:id
pub async fn get_book(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match book_service::get_book(&state.conn, &id).await {
        Ok(book) => Json(json!({ "success": true, "data": book })).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/books/isbn/:isbn
pub async fn get_book_by_isbn(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> impl IntoResponse {
    match book_service::get_book_by_isbn(&state.conn, &isbn).await {
        Ok(book) => Json(json!({ "success": true, "data": book })).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/books
pub async fn create_book(
    State(state): State<AppState>,
    Json(payload): Json<Book>,
) -> impl IntoResponse {
    match book_service::create_book(&state.conn, payload).await {
        Ok(book) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "data": book })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /api/books/:id
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<Book>,
) -> impl IntoResponse {
    match book_service::update_book(&state.conn, &id, payload).await {
        Ok(book) => Json(json!({ "success": true, "data": book })).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/books/:id - soft delete, quantity driven to zero
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match book_service::delete_book(&state.conn, &id).await {
        Ok(()) => Json(json!({
            "success": true,
            "data": { "message": "Book deleted successfully" }
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/books/:id/transactions - a book's ledger history with totals
pub async fn book_transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match ledger_service::book_transactions(&state.conn, &id).await {
        Ok((transactions, analytics)) => Json(json!({
            "success": true,
            "data": {
                "transactions": transactions,
                "analytics": analytics
            }
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}
