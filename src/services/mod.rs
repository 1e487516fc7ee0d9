//! Business logic services - pure domain operations without the HTTP layer

pub mod book_service;
pub mod inventory_service;
pub mod ledger_service;
pub mod sync_service;
