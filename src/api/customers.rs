use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use super::json::Json;
use crate::auth::{Auth, require_fields};
use crate::db::{Customer, Database, NewCustomer};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct CustomersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(CustomersState);

pub fn router(state: CustomersState) -> Router {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .with_state(state)
}

fn not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Customer with id {} not found", id))
}

fn validate(customer: &NewCustomer) -> Result<(), ApiError> {
    require_fields(&[
        ("firstName", Some(customer.first_name.as_str())),
        ("lastName", Some(customer.last_name.as_str())),
    ])?;
    Ok(())
}

async fn list_customers(
    State(state): State<CustomersState>,
    _auth: Auth,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let customers = state
        .db
        .customers()
        .list()
        .await
        .db_err("Failed to list customers")?;
    Ok(Json(customers))
}

async fn get_customer(
    State(state): State<CustomersState>,
    _auth: Auth,
    Path(id): Path<i64>,
) -> Result<Json<Customer>, ApiError> {
    state
        .db
        .customers()
        .get(id)
        .await
        .db_err("Failed to get customer")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn create_customer(
    State(state): State<CustomersState>,
    _auth: Auth,
    Json(payload): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    validate(&payload)?;
    let customer = state
        .db
        .customers()
        .create(&payload)
        .await
        .db_err("Failed to create customer")?;
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn update_customer(
    State(state): State<CustomersState>,
    _auth: Auth,
    Path(id): Path<i64>,
    Json(payload): Json<NewCustomer>,
) -> Result<Json<Customer>, ApiError> {
    validate(&payload)?;
    state
        .db
        .customers()
        .update(id, &payload)
        .await
        .db_err("Failed to update customer")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// Fails with 400 while orders still reference the customer.
async fn delete_customer(
    State(state): State<CustomersState>,
    _auth: Auth,
    Path(id): Path<i64>,
) -> Result<Json<Customer>, ApiError> {
    state
        .db
        .customers()
        .delete(id)
        .await
        .db_err("Failed to delete customer")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}
