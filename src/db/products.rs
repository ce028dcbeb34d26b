//! Product catalogue storage.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct ProductStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub description: Option<String>,
    pub created_at: String,
}

/// Product fields accepted on create and full replacement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[serde(default)]
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    pub description: Option<String>,
}

impl ProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, title, brand, category, price, stock, description, created_at
             FROM products ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, title, brand, category, price, stock, description, created_at
             FROM products WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn create(&self, product: &NewProduct) -> Result<Product, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO products (title, brand, category, price, stock, description)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id, title, brand, category, price, stock, description, created_at",
        )
        .bind(&product.title)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.description)
        .fetch_one(&self.pool)
        .await
    }

    /// Replace all editable fields. Returns `None` if the product does not exist.
    pub async fn update(
        &self,
        id: i64,
        product: &NewProduct,
    ) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE products
             SET title = ?, brand = ?, category = ?, price = ?, stock = ?, description = ?
             WHERE id = ?
             RETURNING id, title, brand, category, price, stock, description, created_at",
        )
        .bind(&product.title)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a product, returning the removed row. Fails with a foreign key
    /// violation while any order still references it.
    pub async fn delete(&self, id: i64) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as(
            "DELETE FROM products WHERE id = ?
             RETURNING id, title, brand, category, price, stock, description, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
