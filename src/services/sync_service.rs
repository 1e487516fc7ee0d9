//! Sync Reconciler - merges an offline client's local writes back into
//! the server store and computes server-side deltas past a watermark.
//!
//! Merge policy: books are upserted by id with a last-write-wins
//! overwrite of the mutable fields (the client is trusted to have merged
//! its own conflicts); transactions are insert-if-absent by id, so a
//! batch resent after a network failure never double-applies. Synced
//! transactions do not adjust quantity - the uploaded book row already
//! carries the client's resulting stock.
//!
//! Batches have partial-failure semantics: each item is attempted on its
//! own and failures are reported per item, never aborting siblings.

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};

use crate::domain::{BookLocks, DomainError};
use crate::models::book::{self, Entity as BookEntity};
use crate::models::transaction::{self, Entity as TransactionEntity, TransactionType};
use crate::models::Book;
use crate::utils::time;

/// Upload payload from an offline client. Books and transactions carry
/// client-assigned ids and timestamps.
#[derive(Debug, Deserialize)]
pub struct SyncUpload {
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(default)]
    pub transactions: Vec<transaction::Model>,
    pub last_sync: String,
}

#[derive(Debug, Serialize)]
pub struct SyncUploadReport {
    pub books_processed: usize,
    pub transactions_processed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncDownload {
    pub books: Vec<Book>,
    pub transactions: Vec<transaction::Model>,
    pub sync_timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub total_books: i64,
    pub total_transactions: i64,
    pub last_book_update: Option<String>,
    pub last_transaction: Option<String>,
    pub server_time: String,
}

/// Merge a client batch into the server store.
pub async fn upload_merge(
    db: &DatabaseConnection,
    locks: &BookLocks,
    upload: SyncUpload,
) -> Result<SyncUploadReport, DomainError> {
    // A malformed watermark is a caller error for the whole request;
    // it is not a per-item outcome.
    time::normalize(&upload.last_sync)
        .map_err(|bad| DomainError::InvalidArgument(format!("invalid last_sync '{}'", bad)))?;

    let mut report = SyncUploadReport {
        books_processed: 0,
        transactions_processed: 0,
        errors: Vec::new(),
    };

    for incoming in upload.books {
        let label = incoming.id.clone().unwrap_or_else(|| "<missing id>".into());
        match merge_book(db, locks, incoming).await {
            Ok(()) => report.books_processed += 1,
            Err(e) => report.errors.push(format!("Book {}: {}", label, e)),
        }
    }

    for incoming in upload.transactions {
        let label = incoming.id.clone();
        match merge_transaction(db, incoming).await {
            Ok(()) => report.transactions_processed += 1,
            Err(e) => report.errors.push(format!("Transaction {}: {}", label, e)),
        }
    }

    tracing::info!(
        books = report.books_processed,
        transactions = report.transactions_processed,
        errors = report.errors.len(),
        "sync upload merged"
    );

    Ok(report)
}

/// Upsert one client book: insert if absent, otherwise overwrite the
/// mutable fields and quantity unconditionally (last-write-wins). Runs
/// under the same per-book lock as the ledger so the direct overwrite
/// cannot interleave with an in-flight append on the same row.
async fn merge_book(
    db: &DatabaseConnection,
    locks: &BookLocks,
    incoming: Book,
) -> Result<(), DomainError> {
    let id = incoming
        .id
        .clone()
        .ok_or_else(|| DomainError::InvalidArgument("id is required".to_string()))?;
    if incoming.quantity < 0 {
        return Err(DomainError::InvalidArgument(
            "quantity must not be negative".to_string(),
        ));
    }
    let created_at = normalize_required(incoming.created_at.as_deref(), "created_at")?;
    let updated_at = normalize_required(incoming.updated_at.as_deref(), "updated_at")?;

    let lock = locks.for_book(&id);
    let _guard = lock.lock().await;

    let active = book::ActiveModel {
        id: Set(id),
        isbn: Set(incoming.isbn),
        title: Set(incoming.title),
        author: Set(incoming.author),
        publisher: Set(incoming.publisher),
        published_date: Set(incoming.published_date),
        description: Set(incoming.description),
        thumbnail_url: Set(incoming.thumbnail_url),
        quantity: Set(incoming.quantity),
        created_at: Set(created_at),
        updated_at: Set(updated_at),
    };

    // id and created_at stay as first written; everything mutable is
    // replaced with the incoming copy
    BookEntity::insert(active)
        .on_conflict(
            OnConflict::column(book::Column::Id)
                .update_columns([
                    book::Column::Title,
                    book::Column::Author,
                    book::Column::Publisher,
                    book::Column::PublishedDate,
                    book::Column::Description,
                    book::Column::ThumbnailUrl,
                    book::Column::Quantity,
                    book::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(())
}

/// Insert one client transaction if its id is unseen; a duplicate id is
/// a silent no-op (idempotent re-delivery). The referenced book must
/// exist - the foreign key rejects orphans.
async fn merge_transaction(
    db: &DatabaseConnection,
    incoming: transaction::Model,
) -> Result<(), DomainError> {
    let tx_type: TransactionType = incoming
        .r#type
        .parse()
        .map_err(DomainError::InvalidArgument)?;
    if incoming.quantity <= 0 {
        return Err(DomainError::InvalidArgument(
            "quantity must be a positive integer".to_string(),
        ));
    }

    let active = transaction::ActiveModel {
        id: Set(incoming.id),
        book_id: Set(incoming.book_id),
        r#type: Set(tx_type.as_str().to_string()),
        quantity: Set(incoming.quantity),
        date: Set(normalize_required(Some(&incoming.date), "date")?),
        volunteer_name: Set(incoming.volunteer_name),
        notes: Set(incoming.notes),
        created_at: Set(normalize_required(Some(&incoming.created_at), "created_at")?),
    };

    let result = TransactionEntity::insert(active)
        .on_conflict(
            OnConflict::column(transaction::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await;

    match result {
        Ok(_) => Ok(()),
        // Duplicate id: already applied in an earlier batch, discard
        Err(DbErr::RecordNotInserted) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Everything that changed after the client's watermark, oldest first so
/// an interrupted client can resume from the last item it saw.
pub async fn download_delta(
    db: &DatabaseConnection,
    since: &str,
) -> Result<SyncDownload, DomainError> {
    let since = time::normalize(since)
        .map_err(|bad| DomainError::InvalidArgument(format!("invalid since date '{}'", bad)))?;

    let books = BookEntity::find()
        .filter(book::Column::UpdatedAt.gt(since.as_str()))
        .order_by_asc(book::Column::UpdatedAt)
        .all(db)
        .await?;

    let transactions = TransactionEntity::find()
        .filter(transaction::Column::CreatedAt.gt(since.as_str()))
        .order_by_asc(transaction::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(SyncDownload {
        books: books.into_iter().map(Book::from).collect(),
        transactions,
        sync_timestamp: time::now(),
    })
}

/// Current store high-water marks, for clients deciding whether to sync
pub async fn sync_status(db: &DatabaseConnection) -> Result<SyncStatus, DomainError> {
    let total_books = BookEntity::find().count(db).await? as i64;
    let total_transactions = TransactionEntity::find().count(db).await? as i64;

    let last_book_update = BookEntity::find()
        .order_by_desc(book::Column::UpdatedAt)
        .one(db)
        .await?
        .map(|b| b.updated_at);

    let last_transaction = TransactionEntity::find()
        .order_by_desc(transaction::Column::CreatedAt)
        .one(db)
        .await?
        .map(|t| t.created_at);

    Ok(SyncStatus {
        total_books,
        total_transactions,
        last_book_update,
        last_transaction,
        server_time: time::now(),
    })
}

fn normalize_required(value: Option<&str>, field: &str) -> Result<String, DomainError> {
    let raw = value
        .ok_or_else(|| DomainError::InvalidArgument(format!("{} is required", field)))?;
    time::normalize(raw)
        .map_err(|bad| DomainError::InvalidArgument(format!("invalid {} '{}'", field, bad)))
}
