//! Domain layer - business rules independent of HTTP and storage details

pub mod errors;
pub mod locks;

pub use errors::DomainError;
pub use locks::BookLocks;
