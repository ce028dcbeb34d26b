pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod invoice_number;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod request_log;

use api::{ApiError, create_api_router};
use auth::{ClientIpHeader, CookiePolicy};
use axum::{Router, extract::OriginalUri, middleware, routing::get};
use db::Database;
use jwt::JwtConfig;
use rate_limit::{RateLimitConfig, RateLimits};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Banner served at the root path.
pub const BANNER: &str = "Invoicer API v1";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Signing keys and lifetimes for access and refresh tokens
    pub jwt: JwtConfig,
    /// Attributes of the refresh cookie
    pub cookies: CookiePolicy,
    /// Per-client limits for login and registration
    pub rate_limits: RateLimits,
    /// Proxy header carrying the client IP (requires running behind a proxy)
    pub ip_header: Option<ClientIpHeader>,
}

async fn banner() -> &'static str {
    BANNER
}

async fn invalid_path(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(format!("404: Invalid path \"{}\"", uri.path()))
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(config.jwt.clone());
    let rate_limit_config = Arc::new(RateLimitConfig::new(config.rate_limits, config.ip_header));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        config.cookies,
        rate_limit_config,
    );

    Router::new()
        .route("/", get(banner))
        .nest("/api/v1", api_router)
        .fallback(invalid_path)
        .layer(middleware::from_fn(request_log::log_requests))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
