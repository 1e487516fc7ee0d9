//! Book Service - catalog operations on the book store
//!
//! Stock quantity is only ever moved by the ledger or the sync
//! reconciler; this module covers creation, metadata edits and lookups.
//! Books are never hard-deleted: removal drives the quantity to zero so
//! the transaction history stays replayable.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::DomainError;
use crate::models::book::{self, ActiveModel as BookActiveModel, Entity as BookEntity};
use crate::models::Book;
use crate::utils::time;

/// Filter parameters for listing books
#[derive(Debug, Default, Clone)]
pub struct BookFilter {
    /// Substring match over title, author and isbn
    pub search: Option<String>,
    pub available_only: bool,
}

/// List books ordered by title, with optional search and availability filter
pub async fn list_books(
    db: &DatabaseConnection,
    filter: BookFilter,
) -> Result<Vec<Book>, DomainError> {
    let mut query = BookEntity::find();

    if let Some(search) = &filter.search {
        if !search.is_empty() {
            query = query.filter(
                Condition::any()
                    .add(book::Column::Title.contains(search))
                    .add(book::Column::Author.contains(search))
                    .add(book::Column::Isbn.contains(search)),
            );
        }
    }

    if filter.available_only {
        query = query.filter(book::Column::Quantity.gt(0));
    }

    let books = query.order_by_asc(book::Column::Title).all(db).await?;

    Ok(books.into_iter().map(Book::from).collect())
}

/// Get a single book by ID
pub async fn get_book(db: &DatabaseConnection, id: &str) -> Result<Book, DomainError> {
    let model = BookEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;
    Ok(Book::from(model))
}

/// Get a single book by its ISBN business key
pub async fn get_book_by_isbn(db: &DatabaseConnection, isbn: &str) -> Result<Book, DomainError> {
    let model = BookEntity::find()
        .filter(book::Column::Isbn.eq(isbn))
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;
    Ok(Book::from(model))
}

/// Create a new book with a server-assigned id
pub async fn create_book(db: &DatabaseConnection, book: Book) -> Result<Book, DomainError> {
    validate_isbn(&book.isbn)?;
    if book.quantity < 0 {
        return Err(DomainError::InvalidArgument(
            "quantity must not be negative".to_string(),
        ));
    }

    let now = time::now();
    let new_book = BookActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        isbn: Set(book.isbn),
        title: Set(book.title),
        author: Set(book.author),
        publisher: Set(book.publisher),
        published_date: Set(book.published_date),
        description: Set(book.description),
        thumbnail_url: Set(book.thumbnail_url),
        quantity: Set(book.quantity),
        created_at: Set(now.clone()),
        updated_at: Set(now),
    };

    let model = new_book.insert(db).await?;
    tracing::info!(book_id = %model.id, isbn = %model.isbn, "book created");
    Ok(Book::from(model))
}

/// Overwrite a book's descriptive fields. `id`, `quantity` and
/// `created_at` are untouched; `updated_at` is bumped so the change is
/// picked up by the next sync delta.
pub async fn update_book(
    db: &DatabaseConnection,
    id: &str,
    data: Book,
) -> Result<Book, DomainError> {
    validate_isbn(&data.isbn)?;

    let model = BookEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    let mut active: BookActiveModel = model.into();
    active.isbn = Set(data.isbn);
    active.title = Set(data.title);
    active.author = Set(data.author);
    active.publisher = Set(data.publisher);
    active.published_date = Set(data.published_date);
    active.description = Set(data.description);
    active.thumbnail_url = Set(data.thumbnail_url);
    active.updated_at = Set(time::now());

    let model = active.update(db).await?;
    Ok(Book::from(model))
}

/// Soft-delete: drive the quantity to zero and bump the watermark
pub async fn delete_book(db: &DatabaseConnection, id: &str) -> Result<(), DomainError> {
    let model = BookEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    let mut active: BookActiveModel = model.into();
    active.quantity = Set(0);
    active.updated_at = Set(time::now());
    active.update(db).await?;

    Ok(())
}

fn validate_isbn(isbn: &str) -> Result<(), DomainError> {
    if isbn.len() != 13 {
        return Err(DomainError::InvalidArgument(
            "isbn must be 13 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn sample(isbn: &str, title: &str) -> Book {
        Book {
            id: None,
            isbn: isbn.to_string(),
            title: title.to_string(),
            author: "Author".to_string(),
            publisher: None,
            published_date: None,
            description: None,
            thumbnail_url: None,
            quantity: 0,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_server_id_and_timestamps() {
        let db = init_db("sqlite::memory:").await.unwrap();

        let book = create_book(&db, sample("9781111111111", "Dune")).await.unwrap();
        let id = book.id.expect("id assigned");
        assert!(!id.is_empty());
        assert_eq!(book.created_at, book.updated_at);

        let fetched = get_book(&db, &id).await.unwrap();
        assert_eq!(fetched.title, "Dune");
        assert_eq!(get_book_by_isbn(&db, "9781111111111").await.unwrap().id, Some(id));
    }

    #[tokio::test]
    async fn rejects_short_isbn() {
        let db = init_db("sqlite::memory:").await.unwrap();
        let err = create_book(&db, sample("123", "Bad")).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn delete_zeroes_quantity_but_keeps_row() {
        let db = init_db("sqlite::memory:").await.unwrap();
        let mut data = sample("9781111111112", "Kept");
        data.quantity = 7;
        let book = create_book(&db, data).await.unwrap();
        let id = book.id.unwrap();

        delete_book(&db, &id).await.unwrap();

        let after = get_book(&db, &id).await.unwrap();
        assert_eq!(after.quantity, 0);
        assert!(after.updated_at.unwrap() >= after.created_at.unwrap());
    }

    #[tokio::test]
    async fn list_supports_search_and_availability() {
        let db = init_db("sqlite::memory:").await.unwrap();
        let mut in_stock = sample("9781111111113", "Rust in Action");
        in_stock.quantity = 2;
        create_book(&db, in_stock).await.unwrap();
        create_book(&db, sample("9781111111114", "Empty Shelf")).await.unwrap();

        let hits = list_books(
            &db,
            BookFilter {
                search: Some("Rust".to_string()),
                available_only: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(hits.len(), 1);

        let available = list_books(
            &db,
            BookFilter {
                search: None,
                available_only: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].title, "Rust in Action");
    }
}
