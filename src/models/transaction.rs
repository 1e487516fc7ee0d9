use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ledger entries are immutable once inserted. They are never updated or
/// deleted except through the book-deletion cascade.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub book_id: String,
    /// 'donation' or 'sale' (see TransactionType)
    pub r#type: String,
    pub quantity: i32,
    /// Business-effective timestamp, may be backdated
    pub date: String,
    pub volunteer_name: Option<String>,
    pub notes: Option<String>,
    /// Server-observed creation time, the sync watermark for transactions
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::book::Entity",
        from = "Column::BookId",
        to = "super::book::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Book,
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Book.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Closed enumeration of stock-moving event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Donation,
    Sale,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Donation => "donation",
            TransactionType::Sale => "sale",
        }
    }

    /// Signed stock delta a transaction of this type applies per unit.
    pub fn sign(&self) -> i32 {
        match self {
            TransactionType::Donation => 1,
            TransactionType::Sale => -1,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donation" => Ok(TransactionType::Donation),
            "sale" => Ok(TransactionType::Sale),
            other => Err(format!("type must be 'donation' or 'sale', got '{}'", other)),
        }
    }
}

/// Input for a ledger append. `id` and `created_at` are always assigned
/// by the server; offline-created transactions arrive via sync instead.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub book_id: String,
    pub r#type: String,
    pub quantity: i32,
    pub date: Option<String>,
    pub volunteer_name: Option<String>,
    pub notes: Option<String>,
}

/// Transaction joined with its book's descriptive fields, for listings
#[derive(Debug, Clone, Serialize)]
pub struct TransactionWithBook {
    #[serde(flatten)]
    pub transaction: Model,
    pub title: String,
    pub author: String,
    pub isbn: String,
}
