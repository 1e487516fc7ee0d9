//! Analytics Aggregator - read-only derivations over the ledger and the
//! book store. Everything here is computed from the same transactions
//! table the ledger writes; there is no separate counter to drift.

use chrono::{Datelike, Duration, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::DomainError;
use crate::models::book::{self, Entity as BookEntity};
use crate::models::transaction::{self, Entity as TransactionEntity, TransactionType};
use crate::models::Book;
use crate::utils::time;

#[derive(Debug, Serialize)]
pub struct InventorySummary {
    pub total_books: i64,
    pub total_quantity: i64,
    pub available_books: i64,
    pub books_with_multiple_copies: i64,
    pub total_donations: i64,
    pub total_sales: i64,
    /// Sales as a percentage of total movement, one decimal; 0 when the
    /// ledger is empty rather than a division by zero
    pub sales_rate: f64,
    pub last_updated: String,
}

/// Movement totals for one time bucket
#[derive(Debug, Default, Serialize)]
pub struct PeriodMetrics {
    pub books_donated: i64,
    pub books_sold: i64,
    pub donation_transactions: usize,
    pub sale_transactions: usize,
    pub total_transactions: usize,
}

#[derive(Debug, Serialize)]
pub struct TimeBasedAnalytics {
    pub today: PeriodMetrics,
    pub this_week: PeriodMetrics,
    pub this_month: PeriodMetrics,
    pub this_year: PeriodMetrics,
}

#[derive(Debug, Serialize)]
pub struct TopSellingBook {
    pub id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub total_sold: i64,
}

#[derive(Debug, Serialize)]
pub struct DailyStat {
    /// Calendar day, YYYY-MM-DD
    pub date: String,
    pub donations: i64,
    pub sales: i64,
}

#[derive(Debug, Serialize)]
pub struct PeriodAnalytics {
    pub recent_transactions: Vec<transaction::TransactionWithBook>,
    pub top_selling_books: Vec<TopSellingBook>,
    pub daily_stats: Vec<DailyStat>,
    pub period_days: i64,
}

/// One book whose materialized quantity disagrees with a replay of its
/// transaction history
#[derive(Debug, Serialize)]
pub struct LedgerMismatch {
    pub book_id: String,
    pub isbn: String,
    pub recorded_quantity: i64,
    pub replayed_quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct LedgerAudit {
    pub books_checked: usize,
    pub mismatches: Vec<LedgerMismatch>,
}

/// Whole-inventory summary statistics
pub async fn inventory_summary(db: &DatabaseConnection) -> Result<InventorySummary, DomainError> {
    let books = BookEntity::find().all(db).await?;
    let transactions = TransactionEntity::find().all(db).await?;

    let total_books = books.len() as i64;
    let total_quantity: i64 = books.iter().map(|b| b.quantity as i64).sum();
    let available_books = books.iter().filter(|b| b.quantity > 0).count() as i64;
    let books_with_multiple_copies = books.iter().filter(|b| b.quantity > 1).count() as i64;

    let total_donations: i64 = transactions
        .iter()
        .filter(|t| t.r#type == TransactionType::Donation.as_str())
        .map(|t| t.quantity as i64)
        .sum();
    let total_sales: i64 = transactions
        .iter()
        .filter(|t| t.r#type == TransactionType::Sale.as_str())
        .map(|t| t.quantity as i64)
        .sum();

    let movement = total_donations + total_sales;
    let sales_rate = if movement > 0 {
        ((total_sales as f64 / movement as f64) * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Ok(InventorySummary {
        total_books,
        total_quantity,
        available_books,
        books_with_multiple_copies,
        total_donations,
        total_sales,
        sales_rate,
        last_updated: time::now(),
    })
}

/// Movement metrics bucketed by calendar period (today, this week
/// starting Sunday, this month, this year), over the business-effective
/// `date` field.
pub async fn time_based_analytics(
    db: &DatabaseConnection,
) -> Result<TimeBasedAnalytics, DomainError> {
    let now = Utc::now();
    let today_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| now.naive_utc());
    let week_start = today_start - Duration::days(now.weekday().num_days_from_sunday() as i64);
    let month_start = today_start.with_day(1).unwrap_or(today_start);
    let year_start = month_start.with_month(1).unwrap_or(month_start);

    // The week bucket can reach into the previous year; fetch from the
    // earliest cutoff and slice in memory
    let fetch_from = cutoff_string(week_start.min(year_start));
    let transactions = TransactionEntity::find()
        .filter(transaction::Column::Date.gte(fetch_from.as_str()))
        .all(db)
        .await?;

    let bucket = |start: NaiveDateTime| {
        let cutoff = cutoff_string(start);
        metrics_for(transactions.iter().filter(|t| t.date >= cutoff))
    };

    Ok(TimeBasedAnalytics {
        today: bucket(today_start),
        this_week: bucket(week_start),
        this_month: bucket(month_start),
        this_year: bucket(year_start),
    })
}

/// Trailing-N-day rollup: recent movement, top sellers and per-day totals
pub async fn period_analytics(
    db: &DatabaseConnection,
    days: i64,
) -> Result<PeriodAnalytics, DomainError> {
    if days <= 0 {
        return Err(DomainError::InvalidArgument(
            "period must be a positive number of days".to_string(),
        ));
    }

    let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Micros, true);

    let recent = TransactionEntity::find()
        .filter(transaction::Column::Date.gte(cutoff.as_str()))
        .order_by_desc(transaction::Column::Date)
        .limit(20)
        .find_also_related(BookEntity)
        .all(db)
        .await?;

    let recent_transactions = recent
        .into_iter()
        .filter_map(|(t, b)| {
            b.map(|b| transaction::TransactionWithBook {
                transaction: t,
                title: b.title,
                author: b.author,
                isbn: b.isbn,
            })
        })
        .collect();

    // Window transactions once for both the top-seller and daily rollups
    let window = TransactionEntity::find()
        .filter(transaction::Column::Date.gte(cutoff.as_str()))
        .all(db)
        .await?;

    let mut sold_by_book: HashMap<String, i64> = HashMap::new();
    let mut by_day: HashMap<String, (i64, i64)> = HashMap::new();
    for t in &window {
        let day = t.date.chars().take(10).collect::<String>();
        let entry = by_day.entry(day).or_default();
        if t.r#type == TransactionType::Sale.as_str() {
            entry.1 += t.quantity as i64;
            *sold_by_book.entry(t.book_id.clone()).or_default() += t.quantity as i64;
        } else {
            entry.0 += t.quantity as i64;
        }
    }

    let mut ranked: Vec<(String, i64)> = sold_by_book.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(10);

    let mut top_selling_books = Vec::with_capacity(ranked.len());
    if !ranked.is_empty() {
        let ids: Vec<String> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let books: HashMap<String, book::Model> = BookEntity::find()
            .filter(book::Column::Id.is_in(ids))
            .all(db)
            .await?
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();

        for (id, total_sold) in ranked {
            if let Some(b) = books.get(&id) {
                top_selling_books.push(TopSellingBook {
                    id,
                    title: b.title.clone(),
                    author: b.author.clone(),
                    isbn: b.isbn.clone(),
                    total_sold,
                });
            }
        }
    }

    let mut daily_stats: Vec<DailyStat> = by_day
        .into_iter()
        .map(|(date, (donations, sales))| DailyStat {
            date,
            donations,
            sales,
        })
        .collect();
    daily_stats.sort_by(|a, b| b.date.cmp(&a.date));

    Ok(PeriodAnalytics {
        recent_transactions,
        top_selling_books,
        daily_stats,
        period_days: days,
    })
}

/// Books with more than one copy in stock, most stocked first
pub async fn books_with_multiple_copies(
    db: &DatabaseConnection,
) -> Result<Vec<Book>, DomainError> {
    let books = BookEntity::find()
        .filter(book::Column::Quantity.gt(1))
        .order_by_desc(book::Column::Quantity)
        .order_by_asc(book::Column::Title)
        .all(db)
        .await?;
    Ok(books.into_iter().map(Book::from).collect())
}

/// Books whose quantity has been driven to zero
pub async fn out_of_stock_books(db: &DatabaseConnection) -> Result<Vec<Book>, DomainError> {
    let books = BookEntity::find()
        .filter(book::Column::Quantity.eq(0))
        .order_by_asc(book::Column::Title)
        .all(db)
        .await?;
    Ok(books.into_iter().map(Book::from).collect())
}

/// Recompute the ledger invariant per book and report every book whose
/// materialized quantity disagrees with the replay. A sync upsert that
/// overwrote quantity without uploading the matching transactions shows
/// up here; a healthy ledger-only history never does.
pub async fn audit_ledger(db: &DatabaseConnection) -> Result<LedgerAudit, DomainError> {
    let books = BookEntity::find().all(db).await?;
    let transactions = TransactionEntity::find().all(db).await?;

    let mut replayed: HashMap<String, i64> = HashMap::new();
    for t in &transactions {
        let sign = if t.r#type == TransactionType::Sale.as_str() {
            -1
        } else {
            1
        };
        *replayed.entry(t.book_id.clone()).or_default() += sign * t.quantity as i64;
    }

    let books_checked = books.len();
    let mismatches = books
        .into_iter()
        .filter_map(|b| {
            let expected = replayed.get(&b.id).copied().unwrap_or(0);
            if b.quantity as i64 != expected {
                Some(LedgerMismatch {
                    book_id: b.id,
                    isbn: b.isbn,
                    recorded_quantity: b.quantity as i64,
                    replayed_quantity: expected,
                })
            } else {
                None
            }
        })
        .collect();

    Ok(LedgerAudit {
        books_checked,
        mismatches,
    })
}

fn cutoff_string(start: NaiveDateTime) -> String {
    Utc.from_utc_datetime(&start)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn metrics_for<'a, I>(transactions: I) -> PeriodMetrics
where
    I: Iterator<Item = &'a transaction::Model>,
{
    let mut metrics = PeriodMetrics::default();
    for t in transactions {
        metrics.total_transactions += 1;
        if t.r#type == TransactionType::Sale.as_str() {
            metrics.sale_transactions += 1;
            metrics.books_sold += t.quantity as i64;
        } else {
            metrics.donation_transactions += 1;
            metrics.books_donated += t.quantity as i64;
        }
    }
    metrics
}
