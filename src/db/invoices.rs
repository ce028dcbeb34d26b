//! Invoice storage and day-scoped invoice numbering.
//!
//! Numbers are derived from store state, never from process memory, so
//! restarts and multiple server instances agree. `invoice_counters` keeps
//! the highest sequence issued per day; deleting invoices never lowers it,
//! so numbers only grow within a day and are never reused.
//! A numbered insert always runs inside the transaction that writes the
//! owning order; that write takes SQLite's write lock first, which
//! serializes read-then-insert. `UNIQUE (day, sequence)` backs this up.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use tracing::{error, warn};

use super::{StoreError, is_unique_violation};
use crate::invoice_number::{InvoiceDay, format_id_number, format_timestamp, next_sequence};

/// How many candidate numbers a single insert tries before giving up.
const MAX_NUMBERING_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct InvoiceStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i64,
    pub id_number: String,
    pub order_id: i64,
    pub paid: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    order_id: i64,
    day: String,
    sequence: i64,
    paid: i32,
    created_at: String,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: row.id,
            id_number: format_id_number(&row.day, row.sequence),
            order_id: row.order_id,
            paid: row.paid != 0,
            created_at: row.created_at,
        }
    }
}

/// Count invoices created within the given day.
async fn count_for_day<'e, E>(executor: E, day: &InvoiceDay) -> Result<i64, sqlx::Error>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let (start, end) = day.bounds();
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM invoices WHERE created_at >= ? AND created_at < ?")
            .bind(start)
            .bind(end)
            .fetch_one(executor)
            .await?;
    Ok(count.0)
}

/// Highest sequence issued for the day, 0 when none was.
///
/// Takes the larger of the day's counter and the stored invoices, so rows
/// written without a counter update still count.
async fn highest_sequence<'e, E>(executor: E, prefix: &str) -> Result<i64, sqlx::Error>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let highest: (i64,) = sqlx::query_as(
        "SELECT COALESCE(MAX(seq), 0) FROM (
             SELECT last_sequence AS seq FROM invoice_counters WHERE day = ?
             UNION ALL
             SELECT sequence AS seq FROM invoices WHERE day = ?
         )",
    )
    .bind(prefix)
    .bind(prefix)
    .fetch_one(executor)
    .await?;
    Ok(highest.0)
}

/// Insert a numbered invoice for `order_id` on the connection of an open
/// transaction. The caller must already hold the write lock.
pub(crate) async fn insert_numbered(
    conn: &mut SqliteConnection,
    order_id: i64,
    now: DateTime<Utc>,
) -> Result<Invoice, StoreError> {
    let day = InvoiceDay::of(now);
    let prefix = day.prefix();
    let created_at = format_timestamp(now);

    let mut sequence = next_sequence(highest_sequence(&mut *conn, &prefix).await?);

    for attempt in 1..=MAX_NUMBERING_ATTEMPTS {
        let result: Result<InvoiceRow, sqlx::Error> = sqlx::query_as(
            "INSERT INTO invoices (order_id, day, sequence, paid, created_at)
             VALUES (?, ?, ?, 0, ?)
             RETURNING id, order_id, day, sequence, paid, created_at",
        )
        .bind(order_id)
        .bind(&prefix)
        .bind(sequence)
        .bind(&created_at)
        .fetch_one(&mut *conn)
        .await;

        match result {
            Ok(row) => {
                sqlx::query(
                    "INSERT INTO invoice_counters (day, last_sequence) VALUES (?, ?)
                     ON CONFLICT (day) DO UPDATE SET last_sequence = excluded.last_sequence",
                )
                .bind(&prefix)
                .bind(sequence)
                .execute(&mut *conn)
                .await?;
                return Ok(row.into());
            }
            Err(e) if is_unique_violation(&e) => {
                warn!(day = %prefix, sequence, attempt, "Invoice number taken, trying the next one");
                sequence += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(StoreError::DuplicateSequenceNumber { day: prefix })
}

/// The invoice attached to an order, if any.
pub(crate) async fn get_by_order(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> Result<Option<Invoice>, sqlx::Error> {
    let row: Option<InvoiceRow> = sqlx::query_as(
        "SELECT id, order_id, day, sequence, paid, created_at FROM invoices WHERE order_id = ?",
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Invoice::from))
}

/// Remove the invoice attached to an order. Returns true if one existed.
pub(crate) async fn delete_by_order(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM invoices WHERE order_id = ?")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

impl InvoiceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Invoice>, sqlx::Error> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(
            "SELECT id, order_id, day, sequence, paid, created_at FROM invoices ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Invoice>, sqlx::Error> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            "SELECT id, order_id, day, sequence, paid, created_at FROM invoices WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Invoice::from))
    }

    /// Mark an invoice paid or unpaid.
    pub async fn set_paid(&self, id: i64, paid: bool) -> Result<Option<Invoice>, sqlx::Error> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            "UPDATE invoices SET paid = ? WHERE id = ?
             RETURNING id, order_id, day, sequence, paid, created_at",
        )
        .bind(paid as i32)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Invoice::from))
    }

    /// Delete an invoice, returning the removed row.
    pub async fn delete(&self, id: i64) -> Result<Option<Invoice>, sqlx::Error> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            "DELETE FROM invoices WHERE id = ?
             RETURNING id, order_id, day, sequence, paid, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Invoice::from))
    }

    /// Number of invoices created on the day containing `at`.
    pub async fn count_for_day(&self, at: DateTime<Utc>) -> Result<i64, sqlx::Error> {
        count_for_day(&self.pool, &InvoiceDay::of(at)).await
    }

    /// The number the next invoice created on the day of `now` would get.
    ///
    /// Returns `None` when the day's numbering cannot be read; callers
    /// treat that as "no number available" rather than an error.
    pub async fn next_id(&self, now: DateTime<Utc>) -> Option<String> {
        let day = InvoiceDay::of(now);
        match highest_sequence(&self.pool, &day.prefix()).await {
            Ok(highest) => Some(day.id_number(next_sequence(highest))),
            Err(e) => {
                error!(error = %e, "Failed to read invoice numbering for the day");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, NewCustomer, NewOrderLine};
    use chrono::{DateTime, TimeZone, Utc};

    async fn seeded() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let customer = db
            .customers()
            .create(&NewCustomer {
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                address: None,
                email: None,
            })
            .await
            .unwrap();
        (db, customer.id)
    }

    fn day(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
    }

    async fn invoiced_order(db: &Database, customer_id: i64, at: DateTime<Utc>) -> String {
        let no_lines: [NewOrderLine; 0] = [];
        db.orders()
            .create(customer_id, &no_lines, true, at)
            .await
            .unwrap()
            .invoice
            .expect("invoice requested")
            .id_number
    }

    #[tokio::test]
    async fn test_sequential_numbers_within_a_day() {
        let (db, customer_id) = seeded().await;

        let mut numbers = Vec::new();
        for hour in 0..4 {
            numbers.push(invoiced_order(&db, customer_id, day(10, hour)).await);
        }

        assert_eq!(
            numbers,
            [
                "2024_06_10-001",
                "2024_06_10-002",
                "2024_06_10-003",
                "2024_06_10-004"
            ]
        );
    }

    #[tokio::test]
    async fn test_numbering_resets_on_day_rollover() {
        let (db, customer_id) = seeded().await;

        invoiced_order(&db, customer_id, day(10, 22)).await;
        invoiced_order(&db, customer_id, day(10, 23)).await;
        let first_of_next_day = invoiced_order(&db, customer_id, day(11, 0)).await;

        assert_eq!(first_of_next_day, "2024_06_11-001");
    }

    #[tokio::test]
    async fn test_next_id_previews_without_consuming() {
        let (db, customer_id) = seeded().await;

        assert_eq!(
            db.invoices().next_id(day(3, 9)).await.as_deref(),
            Some("2024_06_03-001")
        );
        invoiced_order(&db, customer_id, day(3, 9)).await;

        assert_eq!(
            db.invoices().next_id(day(3, 18)).await.as_deref(),
            Some("2024_06_03-002")
        );
        assert_eq!(db.invoices().count_for_day(day(3, 0)).await.unwrap(), 1);
        assert_eq!(db.invoices().count_for_day(day(4, 0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_next_id_is_none_when_store_unavailable() {
        let (db, _) = seeded().await;
        db.pool().close().await;

        assert_eq!(db.invoices().next_id(day(3, 9)).await, None);
    }

    #[tokio::test]
    async fn test_deleted_invoice_numbers_are_not_reused() {
        let (db, customer_id) = seeded().await;

        invoiced_order(&db, customer_id, day(5, 8)).await;
        invoiced_order(&db, customer_id, day(5, 9)).await;

        let first = db.invoices().list().await.unwrap()[0].id;
        db.invoices().delete(first).await.unwrap();

        let next = invoiced_order(&db, customer_id, day(5, 10)).await;
        assert_eq!(next, "2024_06_05-003");
    }

    #[tokio::test]
    async fn test_numbering_continues_after_bulk_deletion() {
        let (db, customer_id) = seeded().await;
        for minute in 0..10 {
            invoiced_order(&db, customer_id, day(7, 8) + chrono::Duration::minutes(minute)).await;
        }

        // Remove 001..005; five invoices remain but 006..010 are taken
        let invoices = db.invoices().list().await.unwrap();
        for invoice in &invoices[..5] {
            db.invoices().delete(invoice.id).await.unwrap();
        }
        assert_eq!(db.invoices().next_id(day(7, 12)).await.as_deref(), Some("2024_06_07-011"));

        let next = invoiced_order(&db, customer_id, day(7, 12)).await;
        assert_eq!(next, "2024_06_07-011");
    }

    #[tokio::test]
    async fn test_numbers_stay_increasing_when_day_is_emptied() {
        let (db, customer_id) = seeded().await;
        for hour in 8..11 {
            invoiced_order(&db, customer_id, day(8, hour)).await;
        }

        for invoice in db.invoices().list().await.unwrap() {
            db.invoices().delete(invoice.id).await.unwrap();
        }

        let next = invoiced_order(&db, customer_id, day(8, 15)).await;
        assert_eq!(next, "2024_06_08-004");
    }

    #[tokio::test]
    async fn test_set_paid() {
        let (db, customer_id) = seeded().await;
        invoiced_order(&db, customer_id, day(1, 12)).await;
        let invoice = db.invoices().list().await.unwrap().remove(0);
        assert!(!invoice.paid);

        let updated = db.invoices().set_paid(invoice.id, true).await.unwrap().unwrap();
        assert!(updated.paid);
        assert_eq!(updated.id_number, invoice.id_number);

        assert!(db.invoices().set_paid(999, true).await.unwrap().is_none());
    }
}
