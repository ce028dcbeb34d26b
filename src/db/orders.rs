//! Orders, their product lines and the optional invoice attached to each.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnection, SqlitePool};

use super::StoreError;
use super::invoices::{self, Invoice};
use crate::invoice_number::format_timestamp;

#[derive(Clone)]
pub struct OrderStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub created_at: String,
    pub products: Vec<OrderLine>,
    pub invoice: Option<Invoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i64,
}

/// A requested order line. Older clients send the product as `id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    #[serde(alias = "id")]
    pub product_id: i64,
    pub quantity: Option<i64>,
}

impl NewOrderLine {
    /// Missing or zero quantities count as one item.
    pub fn effective_quantity(&self) -> i64 {
        match self.quantity {
            None | Some(0) => 1,
            Some(q) => q,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    customer_id: i64,
    created_at: String,
}

async fn insert_lines(
    conn: &mut SqliteConnection,
    order_id: i64,
    lines: &[NewOrderLine],
) -> Result<(), sqlx::Error> {
    for line in lines {
        sqlx::query("INSERT INTO order_products (order_id, product_id, quantity) VALUES (?, ?, ?)")
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.effective_quantity())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn load_lines(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> Result<Vec<OrderLine>, sqlx::Error> {
    sqlx::query_as(
        "SELECT product_id, quantity FROM order_products WHERE order_id = ? ORDER BY product_id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}

/// Attach lines and invoice to a bare order row.
async fn hydrate(conn: &mut SqliteConnection, row: OrderRow) -> Result<Order, sqlx::Error> {
    let products = load_lines(&mut *conn, row.id).await?;
    let invoice = invoices::get_by_order(&mut *conn, row.id).await?;
    Ok(Order {
        id: row.id,
        customer_id: row.customer_id,
        created_at: row.created_at,
        products,
        invoice,
    })
}

async fn fetch_row(conn: &mut SqliteConnection, id: i64) -> Result<Option<OrderRow>, sqlx::Error> {
    sqlx::query_as("SELECT id, customer_id, created_at FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
}

impl OrderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Order>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<OrderRow> =
            sqlx::query_as("SELECT id, customer_id, created_at FROM orders ORDER BY id")
                .fetch_all(&mut *conn)
                .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(hydrate(&mut conn, row).await?);
        }
        Ok(orders)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Order>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        match fetch_row(&mut conn, id).await? {
            Some(row) => Ok(Some(hydrate(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Create an order with its lines and, when requested, a numbered invoice.
    ///
    /// Everything happens in one transaction. The order insert comes first so
    /// the write lock is held before the day's invoices are counted.
    pub async fn create(
        &self,
        customer_id: i64,
        lines: &[NewOrderLine],
        with_invoice: bool,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: OrderRow = sqlx::query_as(
            "INSERT INTO orders (customer_id, created_at) VALUES (?, ?)
             RETURNING id, customer_id, created_at",
        )
        .bind(customer_id)
        .bind(format_timestamp(now))
        .fetch_one(&mut *tx)
        .await?;

        insert_lines(&mut tx, row.id, lines).await?;

        if with_invoice {
            invoices::insert_numbered(&mut tx, row.id, now).await?;
        }

        let order = hydrate(&mut tx, row).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Replace an order's customer and lines.
    ///
    /// `invoice` of `None` leaves the invoice as it is. `Some(true)` keeps an
    /// existing invoice and its number, or creates one. `Some(false)` removes it.
    /// Returns `None` if the order does not exist.
    pub async fn update(
        &self,
        id: i64,
        customer_id: i64,
        lines: &[NewOrderLine],
        invoice: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<OrderRow> = sqlx::query_as(
            "UPDATE orders SET customer_id = ? WHERE id = ?
             RETURNING id, customer_id, created_at",
        )
        .bind(customer_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM order_products WHERE order_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_lines(&mut tx, id, lines).await?;

        let existing = invoices::get_by_order(&mut tx, id).await?;
        match (invoice, existing) {
            (Some(true), None) => {
                invoices::insert_numbered(&mut tx, id, now).await?;
            }
            (Some(false), Some(_)) => {
                invoices::delete_by_order(&mut tx, id).await?;
            }
            _ => {}
        }

        let order = hydrate(&mut tx, row).await?;
        tx.commit().await?;
        Ok(Some(order))
    }

    /// Delete an order with its lines and invoice, returning what was removed.
    pub async fn delete(&self, id: i64) -> Result<Option<Order>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = fetch_row(&mut tx, id).await? else {
            return Ok(None);
        };
        let order = hydrate(&mut tx, row).await?;

        sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(order))
    }
}
