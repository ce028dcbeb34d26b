use axum::{
    Router,
    extract::{Path, State},
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use super::json::Json;
use crate::auth::{AdminOnly, Auth, AuthError};
use crate::db::{Database, Invoice};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct InvoicesState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(InvoicesState);

pub fn router(state: InvoicesState) -> Router {
    Router::new()
        .route("/", get(list_invoices))
        .route("/next-id", get(next_id))
        .route(
            "/{id}",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct UpdateInvoiceRequest {
    paid: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NextIdResponse {
    /// `null` when the day's invoices could not be counted
    next_id: Option<String>,
}

fn not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Invoice with id {} not found", id))
}

async fn list_invoices(
    State(state): State<InvoicesState>,
    _auth: Auth,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    let invoices = state
        .db
        .invoices()
        .list()
        .await
        .db_err("Failed to list invoices")?;
    Ok(Json(invoices))
}

/// Preview the number the next invoice created today would receive.
async fn next_id(State(state): State<InvoicesState>, _auth: Auth) -> Json<NextIdResponse> {
    Json(NextIdResponse {
        next_id: state.db.invoices().next_id(Utc::now()).await,
    })
}

async fn get_invoice(
    State(state): State<InvoicesState>,
    _auth: Auth,
    Path(id): Path<i64>,
) -> Result<Json<Invoice>, ApiError> {
    state
        .db
        .invoices()
        .get(id)
        .await
        .db_err("Failed to get invoice")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// Only the paid flag can change; the number is fixed once issued.
async fn update_invoice(
    State(state): State<InvoicesState>,
    _auth: Auth,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<Json<Invoice>, ApiError> {
    let paid = payload
        .paid
        .ok_or_else(|| AuthError::MissingFields(vec!["paid"]))?;

    state
        .db
        .invoices()
        .set_paid(id, paid)
        .await
        .db_err("Failed to update invoice")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn delete_invoice(
    State(state): State<InvoicesState>,
    auth: Auth<AdminOnly>,
    Path(id): Path<i64>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice = state
        .db
        .invoices()
        .delete(id)
        .await
        .db_err("Failed to delete invoice")?
        .ok_or_else(|| not_found(id))?;

    info!(invoice = %invoice.id_number, by = %auth.identity.username, "Invoice deleted");
    Ok(Json(invoice))
}
