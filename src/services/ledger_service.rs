//! Transaction Ledger - the append-only record of stock-moving events
//!
//! Every donation/sale append is one atomic unit: insert the immutable
//! transaction row and adjust the owning book's materialized `quantity`
//! counter, or roll back both halves. A failed append leaves no trace.
//!
//! Appends for the same book are serialized through the per-book lock
//! table shared with the sync reconciler, so the InsufficientStock
//! check-then-decrement is linearizable per book.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::domain::{BookLocks, DomainError};
use crate::models::book::{self, Entity as BookEntity};
use crate::models::transaction::{self, Entity as TransactionEntity, TransactionType};
use crate::models::NewTransaction;
use crate::utils::time;

/// Filter parameters for listing ledger entries
#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    pub book_id: Option<String>,
    pub r#type: Option<String>,
    pub volunteer_name: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// Per-book movement totals derived from that book's transactions.
/// Matches a replay of the ledger invariant: quantity == times_donated -
/// times_sold for a book whose stock only ever moved through appends.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BookTransactionAnalytics {
    pub total_transactions: usize,
    pub times_donated: i64,
    pub times_sold: i64,
    pub donation_count: usize,
    pub sale_count: usize,
}

/// Append a transaction to the ledger and adjust the book's stock.
///
/// Fails with `NotFound` for an unknown book, `InvalidArgument` for a bad
/// type/quantity/date, and `InsufficientStock` when a sale would drive
/// the quantity negative. On any failure nothing is persisted.
pub async fn append_transaction(
    db: &DatabaseConnection,
    locks: &BookLocks,
    input: NewTransaction,
) -> Result<transaction::Model, DomainError> {
    let tx_type: TransactionType = input
        .r#type
        .parse()
        .map_err(DomainError::InvalidArgument)?;

    if input.quantity <= 0 {
        return Err(DomainError::InvalidArgument(
            "quantity must be a positive integer".to_string(),
        ));
    }

    // Business-effective date may be backdated; default is now
    let date = match input.date {
        Some(raw) => time::normalize(&raw)
            .map_err(|bad| DomainError::InvalidArgument(format!("invalid date '{}'", bad)))?,
        None => time::now(),
    };

    // Serialize against concurrent appends and sync overwrites on this book
    let lock = locks.for_book(&input.book_id);
    let _guard = lock.lock().await;

    let txn = db.begin().await?;

    let book = BookEntity::find_by_id(&input.book_id)
        .one(&txn)
        .await?
        .ok_or(DomainError::NotFound)?;

    if tx_type == TransactionType::Sale && book.quantity < input.quantity {
        // Rejected before any write, the open txn has nothing to undo
        return Err(DomainError::InsufficientStock);
    }

    let now = time::now();
    let record = transaction::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        book_id: Set(input.book_id.clone()),
        r#type: Set(tx_type.as_str().to_string()),
        quantity: Set(input.quantity),
        date: Set(date),
        volunteer_name: Set(input.volunteer_name),
        notes: Set(input.notes),
        created_at: Set(now.clone()),
    };

    let saved = record.insert(&txn).await?;

    // Atomic counter adjustment plus watermark bump on the same row
    let delta = tx_type.sign() * input.quantity;
    BookEntity::update_many()
        .col_expr(
            book::Column::Quantity,
            Expr::col(book::Column::Quantity).add(delta),
        )
        .col_expr(book::Column::UpdatedAt, Expr::value(now))
        .filter(book::Column::Id.eq(input.book_id.as_str()))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        book_id = %saved.book_id,
        kind = %saved.r#type,
        quantity = saved.quantity,
        "ledger append committed"
    );

    Ok(saved)
}

/// Latest committed stock quantity for a book. No caching layer sits on
/// this path - it backs the InsufficientStock check.
pub async fn quantity_for(db: &DatabaseConnection, book_id: &str) -> Result<i32, DomainError> {
    let book = BookEntity::find_by_id(book_id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;
    Ok(book.quantity)
}

/// Get a single transaction with its book's descriptive fields
pub async fn get_transaction(
    db: &DatabaseConnection,
    id: &str,
) -> Result<transaction::TransactionWithBook, DomainError> {
    let (tx, book) = TransactionEntity::find_by_id(id)
        .find_also_related(BookEntity)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    // book_id is a NOT NULL foreign key, the join can only miss if the
    // cascade raced us; treat it the same as a missing transaction
    let book = book.ok_or(DomainError::NotFound)?;

    Ok(transaction::TransactionWithBook {
        transaction: tx,
        title: book.title,
        author: book.author,
        isbn: book.isbn,
    })
}

/// List ledger entries, newest business date first
pub async fn list_transactions(
    db: &DatabaseConnection,
    filter: TransactionFilter,
) -> Result<Vec<transaction::TransactionWithBook>, DomainError> {
    let mut query = TransactionEntity::find();

    if let Some(book_id) = &filter.book_id {
        query = query.filter(transaction::Column::BookId.eq(book_id.as_str()));
    }
    if let Some(tx_type) = &filter.r#type {
        query = query.filter(transaction::Column::Type.eq(tx_type.as_str()));
    }
    if let Some(name) = &filter.volunteer_name {
        query = query.filter(transaction::Column::VolunteerName.contains(name));
    }
    if let Some(from) = &filter.date_from {
        query = query.filter(transaction::Column::Date.gte(from.as_str()));
    }
    if let Some(to) = &filter.date_to {
        query = query.filter(transaction::Column::Date.lte(to.as_str()));
    }

    let rows = query
        .order_by_desc(transaction::Column::Date)
        .find_also_related(BookEntity)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(tx, book)| {
            book.map(|b| transaction::TransactionWithBook {
                transaction: tx,
                title: b.title,
                author: b.author,
                isbn: b.isbn,
            })
        })
        .collect())
}

/// All transactions for one book, newest first, with movement totals
pub async fn book_transactions(
    db: &DatabaseConnection,
    book_id: &str,
) -> Result<(Vec<transaction::Model>, BookTransactionAnalytics), DomainError> {
    let transactions = TransactionEntity::find()
        .filter(transaction::Column::BookId.eq(book_id))
        .order_by_desc(transaction::Column::Date)
        .all(db)
        .await?;

    let donations: Vec<&transaction::Model> = transactions
        .iter()
        .filter(|t| t.r#type == TransactionType::Donation.as_str())
        .collect();
    let sales: Vec<&transaction::Model> = transactions
        .iter()
        .filter(|t| t.r#type == TransactionType::Sale.as_str())
        .collect();

    let analytics = BookTransactionAnalytics {
        total_transactions: transactions.len(),
        times_donated: donations.iter().map(|t| t.quantity as i64).sum(),
        times_sold: sales.iter().map(|t| t.quantity as i64).sum(),
        donation_count: donations.len(),
        sale_count: sales.len(),
    };

    Ok((transactions, analytics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::services::book_service;
    use crate::models::Book;
    use sea_orm::{ConnectionTrait, Statement};

    async fn setup() -> (DatabaseConnection, BookLocks) {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        (db, BookLocks::new())
    }

    async fn seed_book(db: &DatabaseConnection, isbn: &str, quantity: i32) -> String {
        let book = book_service::create_book(
            db,
            Book {
                id: None,
                isbn: isbn.to_string(),
                title: "Test Book".to_string(),
                author: "Test Author".to_string(),
                publisher: None,
                published_date: None,
                description: None,
                thumbnail_url: None,
                quantity,
                created_at: None,
                updated_at: None,
            },
        )
        .await
        .expect("Failed to create book");
        book.id.unwrap()
    }

    fn donation(book_id: &str, quantity: i32) -> NewTransaction {
        NewTransaction {
            book_id: book_id.to_string(),
            r#type: "donation".to_string(),
            quantity,
            date: None,
            volunteer_name: Some("Ana".to_string()),
            notes: None,
        }
    }

    fn sale(book_id: &str, quantity: i32) -> NewTransaction {
        NewTransaction {
            r#type: "sale".to_string(),
            ..donation(book_id, quantity)
        }
    }

    #[tokio::test]
    async fn donation_then_sale_then_overdraw() {
        // Scenario: start at 0, donate 5, sell 3, selling 5 more must fail
        let (db, locks) = setup().await;
        let book_id = seed_book(&db, "9780000000001", 0).await;

        let tx = append_transaction(&db, &locks, donation(&book_id, 5))
            .await
            .expect("donation failed");
        assert_eq!(tx.quantity, 5);
        assert!(!tx.id.is_empty());
        assert_eq!(quantity_for(&db, &book_id).await.unwrap(), 5);

        append_transaction(&db, &locks, sale(&book_id, 3))
            .await
            .expect("sale failed");
        assert_eq!(quantity_for(&db, &book_id).await.unwrap(), 2);

        let err = append_transaction(&db, &locks, sale(&book_id, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock));
        assert_eq!(quantity_for(&db, &book_id).await.unwrap(), 2);

        // The rejected sale left no ledger entry
        let (txs, analytics) = book_transactions(&db, &book_id).await.unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(analytics.times_donated, 5);
        assert_eq!(analytics.times_sold, 3);
    }

    #[tokio::test]
    async fn quantity_always_matches_ledger_replay() {
        let (db, locks) = setup().await;
        let book_id = seed_book(&db, "9780000000002", 0).await;

        for (kind, qty) in [("donation", 10), ("sale", 4), ("donation", 2), ("sale", 7)] {
            let input = NewTransaction {
                r#type: kind.to_string(),
                ..donation(&book_id, qty)
            };
            append_transaction(&db, &locks, input).await.unwrap();

            let (_, analytics) = book_transactions(&db, &book_id).await.unwrap();
            let replayed = analytics.times_donated - analytics.times_sold;
            let materialized = quantity_for(&db, &book_id).await.unwrap() as i64;
            assert_eq!(materialized, replayed);
            assert!(materialized >= 0);
        }
    }

    #[tokio::test]
    async fn rejects_unknown_book_without_trace() {
        let (db, locks) = setup().await;

        let err = append_transaction(&db, &locks, donation("missing", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));

        let count = TransactionEntity::find().all(&db).await.unwrap().len();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn rejects_invalid_type_and_quantity() {
        let (db, locks) = setup().await;
        let book_id = seed_book(&db, "9780000000003", 1).await;

        let bad_type = NewTransaction {
            r#type: "loan".to_string(),
            ..donation(&book_id, 1)
        };
        assert!(matches!(
            append_transaction(&db, &locks, bad_type).await.unwrap_err(),
            DomainError::InvalidArgument(_)
        ));

        assert!(matches!(
            append_transaction(&db, &locks, donation(&book_id, 0))
                .await
                .unwrap_err(),
            DomainError::InvalidArgument(_)
        ));
        assert!(matches!(
            append_transaction(&db, &locks, donation(&book_id, -3))
                .await
                .unwrap_err(),
            DomainError::InvalidArgument(_)
        ));

        assert_eq!(quantity_for(&db, &book_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn backdated_date_is_accepted_and_normalized() {
        let (db, locks) = setup().await;
        let book_id = seed_book(&db, "9780000000004", 0).await;

        let input = NewTransaction {
            date: Some("2024-01-15T09:30:00+02:00".to_string()),
            ..donation(&book_id, 1)
        };
        let tx = append_transaction(&db, &locks, input).await.unwrap();
        assert_eq!(tx.date, "2024-01-15T07:30:00.000000Z");
        // created_at is server-observed, not the backdated value
        assert!(tx.created_at > tx.date);

        let bad = NewTransaction {
            date: Some("yesterday".to_string()),
            ..donation(&book_id, 1)
        };
        assert!(matches!(
            append_transaction(&db, &locks, bad).await.unwrap_err(),
            DomainError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn list_transactions_filters_by_type_and_book() {
        let (db, locks) = setup().await;
        let first = seed_book(&db, "9780000000005", 0).await;
        let second = seed_book(&db, "9780000000006", 0).await;

        append_transaction(&db, &locks, donation(&first, 3))
            .await
            .unwrap();
        append_transaction(&db, &locks, donation(&second, 2))
            .await
            .unwrap();
        append_transaction(&db, &locks, sale(&first, 1)).await.unwrap();

        let sales_only = list_transactions(
            &db,
            TransactionFilter {
                r#type: Some("sale".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(sales_only.len(), 1);
        assert_eq!(sales_only[0].transaction.book_id, first);

        let first_only = list_transactions(
            &db,
            TransactionFilter {
                book_id: Some(first.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(first_only.len(), 2);
        assert_eq!(first_only[0].isbn, "9780000000005");
    }

    async fn install_trigger(db: &DatabaseConnection, sql: &str) {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await
        .expect("Failed to run trigger DDL");
    }

    #[tokio::test]
    async fn failed_append_rolls_back_both_halves() {
        let (db, locks) = setup().await;
        let book_id = seed_book(&db, "9780000000007", 4).await;

        // Break the counter-adjustment half: the transaction row insert
        // succeeds inside the unit, then the books UPDATE aborts.
        install_trigger(
            &db,
            "CREATE TRIGGER books_frozen BEFORE UPDATE ON books \
             BEGIN SELECT RAISE(ABORT, 'storage failure'); END",
        )
        .await;

        let err = append_transaction(&db, &locks, donation(&book_id, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));

        // No orphan ledger row, counter untouched
        assert!(TransactionEntity::find().all(&db).await.unwrap().is_empty());
        assert_eq!(quantity_for(&db, &book_id).await.unwrap(), 4);

        install_trigger(&db, "DROP TRIGGER books_frozen").await;

        // Break the insert half instead; the counter must not move either
        install_trigger(
            &db,
            "CREATE TRIGGER ledger_frozen BEFORE INSERT ON transactions \
             BEGIN SELECT RAISE(ABORT, 'storage failure'); END",
        )
        .await;

        let err = append_transaction(&db, &locks, sale(&book_id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));
        assert!(TransactionEntity::find().all(&db).await.unwrap().is_empty());
        assert_eq!(quantity_for(&db, &book_id).await.unwrap(), 4);

        // A healthy append goes through once the failure clears
        install_trigger(&db, "DROP TRIGGER ledger_frozen").await;
        append_transaction(&db, &locks, sale(&book_id, 1))
            .await
            .expect("sale after recovery failed");
        assert_eq!(quantity_for(&db, &book_id).await.unwrap(), 3);
    }
}
