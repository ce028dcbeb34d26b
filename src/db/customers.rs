//! Customer storage.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct CustomerStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub email: Option<String>,
    pub created_at: String,
}

/// Customer fields accepted on create and full replacement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub address: Option<String>,
    pub email: Option<String>,
}

impl CustomerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Customer>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, first_name, last_name, address, email, created_at FROM customers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, first_name, last_name, address, email, created_at FROM customers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn create(&self, customer: &NewCustomer) -> Result<Customer, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO customers (first_name, last_name, address, email)
             VALUES (?, ?, ?, ?) RETURNING id, first_name, last_name, address, email, created_at",
        )
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.address)
        .bind(&customer.email)
        .fetch_one(&self.pool)
        .await
    }

    /// Replace all editable fields. Returns `None` if the customer does not exist.
    pub async fn update(
        &self,
        id: i64,
        customer: &NewCustomer,
    ) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE customers SET first_name = ?, last_name = ?, address = ?, email = ?
             WHERE id = ? RETURNING id, first_name, last_name, address, email, created_at",
        )
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.address)
        .bind(&customer.email)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a customer, returning the removed row.
    pub async fn delete(&self, id: i64) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as(
            "DELETE FROM customers WHERE id = ? RETURNING id, first_name, last_name, address, email, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
