mod customers;
mod error;
mod invoices;
mod json;
mod orders;
mod products;
mod session;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::CookiePolicy;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ResultExt, map_db_error};
pub use json::Json;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    cookies: CookiePolicy,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let session_state = session::SessionState {
        db: db.clone(),
        jwt: jwt.clone(),
        cookies,
        rate_limit_config: rate_limit_config.clone(),
    };

    let users_state = users::UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
        cookies,
        rate_limit_config,
    };

    let customers_state = customers::CustomersState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let products_state = products::ProductsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let orders_state = orders::OrdersState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let invoices_state = invoices::InvoicesState { db, jwt };

    Router::new()
        .nest("/auth", session::router(session_state))
        .nest("/users", users::router(users_state))
        .nest("/customers", customers::router(customers_state))
        .nest("/products", products::router(products_state))
        .nest("/orders", orders::router(orders_state))
        .nest("/invoices", invoices::router(invoices_state))
}
