pub mod book;
pub mod transaction;

pub use book::Book;
pub use transaction::{NewTransaction, TransactionType};
