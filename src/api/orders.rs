//! Orders, optionally invoiced at creation or on a later update.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use super::json::Json;
use crate::auth::{Auth, AuthError};
use crate::db::{Database, NewOrderLine, Order};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct OrdersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(OrdersState);

pub fn router(state: OrdersState) -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/{id}", get(get_order).put(update_order).delete(delete_order))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest {
    customer_id: Option<i64>,
    products: Option<Vec<NewOrderLine>>,
    invoice: Option<bool>,
}

impl OrderRequest {
    /// The customer and lines, which every create and update must send.
    fn required(&self) -> Result<(i64, &[NewOrderLine]), ApiError> {
        let mut missing = Vec::new();
        if self.customer_id.is_none() {
            missing.push("customerId");
        }
        if self.products.is_none() {
            missing.push("products");
        }
        if !missing.is_empty() {
            return Err(AuthError::MissingFields(missing).into());
        }

        let lines = self.products.as_deref().unwrap_or_default();
        if let Some(line) = lines.iter().find(|l| l.quantity.is_some_and(|q| q < 0)) {
            return Err(ApiError::bad_request(format!(
                "Quantity for product {} must not be negative",
                line.product_id
            )));
        }

        Ok((self.customer_id.unwrap_or_default(), lines))
    }
}

fn not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Order with id {} not found", id))
}

async fn list_orders(
    State(state): State<OrdersState>,
    _auth: Auth,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state.db.orders().list().await.db_err("Failed to list orders")?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<OrdersState>,
    _auth: Auth,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    state
        .db
        .orders()
        .get(id)
        .await
        .db_err("Failed to get order")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// Create an order. With `invoice: true` a numbered invoice is created in
/// the same transaction.
async fn create_order(
    State(state): State<OrdersState>,
    auth: Auth,
    Json(payload): Json<OrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let (customer_id, lines) = payload.required()?;
    let with_invoice = payload.invoice.unwrap_or(false);

    let order = state
        .db
        .orders()
        .create(customer_id, lines, with_invoice, Utc::now())
        .await
        .db_err("Failed to create order")?;

    if let Some(invoice) = &order.invoice {
        info!(order_id = order.id, invoice = %invoice.id_number, by = %auth.identity.username, "Order invoiced");
    }
    Ok((StatusCode::CREATED, Json(order)))
}

async fn update_order(
    State(state): State<OrdersState>,
    _auth: Auth,
    Path(id): Path<i64>,
    Json(payload): Json<OrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let (customer_id, lines) = payload.required()?;

    state
        .db
        .orders()
        .update(id, customer_id, lines, payload.invoice, Utc::now())
        .await
        .db_err("Failed to update order")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn delete_order(
    State(state): State<OrdersState>,
    _auth: Auth,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    state
        .db
        .orders()
        .delete(id)
        .await
        .db_err("Failed to delete order")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}
