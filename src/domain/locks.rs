//! Per-book mutual exclusion
//!
//! The book row is the unit of mutual exclusion: the ledger's
//! check-then-adjust and the sync reconciler's full-row overwrite both
//! mutate `quantity`, so both paths must serialize through the same lock.
//! Locks are keyed by book id and created on first use.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct BookLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl BookLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Get the lock for a book id. The caller holds the returned Arc for
    /// the duration of its `.lock().await` guard; entries are never
    /// removed, a dormant mutex costs a few bytes.
    pub fn for_book(&self, book_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(book_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
