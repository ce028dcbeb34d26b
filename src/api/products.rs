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
use crate::db::{Database, NewProduct, Product};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct ProductsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(ProductsState);

pub fn router(state: ProductsState) -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .with_state(state)
}

fn not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Product with id {} not found", id))
}

fn validate(product: &NewProduct) -> Result<(), ApiError> {
    require_fields(&[("title", Some(product.title.as_str()))])?;
    if product.price < 0.0 || !product.price.is_finite() {
        return Err(ApiError::bad_request("Price must be a non-negative number"));
    }
    if product.stock < 0 {
        return Err(ApiError::bad_request("Stock must not be negative"));
    }
    Ok(())
}

async fn list_products(
    State(state): State<ProductsState>,
    _auth: Auth,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .db
        .products()
        .list()
        .await
        .db_err("Failed to list products")?;
    Ok(Json(products))
}

async fn get_product(
    State(state): State<ProductsState>,
    _auth: Auth,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    state
        .db
        .products()
        .get(id)
        .await
        .db_err("Failed to get product")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn create_product(
    State(state): State<ProductsState>,
    _auth: Auth,
    Json(payload): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    validate(&payload)?;
    let product = state
        .db
        .products()
        .create(&payload)
        .await
        .db_err("Failed to create product")?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<ProductsState>,
    _auth: Auth,
    Path(id): Path<i64>,
    Json(payload): Json<NewProduct>,
) -> Result<Json<Product>, ApiError> {
    validate(&payload)?;
    state
        .db
        .products()
        .update(id, &payload)
        .await
        .db_err("Failed to update product")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn delete_product(
    State(state): State<ProductsState>,
    _auth: Auth,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    state
        .db
        .products()
        .delete(id)
        .await
        .db_err("Failed to delete product")?
        .map(Json)
        .ok_or_else(|| not_found(id))
}
