use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::sync::Arc;

use crate::domain::BookLocks;

/// Application state shared across all handlers: the store connection and
/// the per-book lock table. Both are handed to components explicitly at
/// construction, there is no ambient global handle.
#[derive(Clone)]
pub struct AppState {
    pub conn: DatabaseConnection,
    pub locks: Arc<BookLocks>,
}

impl AppState {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            locks: Arc::new(BookLocks::new()),
        }
    }
}

impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.conn.clone()
    }
}

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    // SQLite needs this pragma for the transactions -> books cascade
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = ON".to_owned(),
    ))
    .await?;

    // Create books table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            isbn TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            publisher TEXT,
            published_date TEXT,
            description TEXT,
            thumbnail_url TEXT,
            quantity INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
        .to_owned(),
    ))
    .await?;

    // Create transactions table (append-only ledger)
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            book_id TEXT NOT NULL,
            type TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            date TEXT NOT NULL,
            volunteer_name TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )
        "#
        .to_owned(),
    ))
    .await?;

    // Indexes for lookups and sync watermark scans
    for stmt in [
        "CREATE INDEX IF NOT EXISTS idx_books_isbn ON books(isbn)",
        "CREATE INDEX IF NOT EXISTS idx_books_title ON books(title)",
        "CREATE INDEX IF NOT EXISTS idx_books_quantity ON books(quantity)",
        "CREATE INDEX IF NOT EXISTS idx_books_updated_at ON books(updated_at)",
        "CREATE INDEX IF NOT EXISTS idx_transactions_book_id ON transactions(book_id)",
        "CREATE INDEX IF NOT EXISTS idx_transactions_type ON transactions(type)",
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)",
        "CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions(created_at)",
    ] {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            stmt.to_owned(),
        ))
        .await?;
    }

    Ok(())
}
