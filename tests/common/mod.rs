#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use invoicer::{
    ServerConfig,
    auth::{CookiePolicy, SameSite},
    create_app,
    db::{Database, UserUpdate},
    jwt::{JwtConfig, TokenLifetimes},
    rate_limit::RateLimits,
};
use serde_json::Value;
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";
pub const PASSWORD: &str = "secret123";

/// Limits high enough that ordinary tests never trip them.
pub const RELAXED_LIMITS: RateLimits = RateLimits {
    login_per_minute: 1000,
    signup_per_minute: 1000,
};

pub fn test_config(db: Database, rate_limits: RateLimits) -> ServerConfig {
    ServerConfig {
        db,
        jwt: JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET, TokenLifetimes::default())
            .expect("Invalid test secrets"),
        cookies: CookiePolicy {
            secure: false,
            same_site: SameSite::Strict,
        },
        rate_limits,
        ip_header: None,
    }
}

pub async fn create_test_app() -> (Router, Database) {
    create_test_app_with_limits(RELAXED_LIMITS).await
}

pub async fn create_test_app_with_limits(rate_limits: RateLimits) -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let app = create_app(&test_config(db.clone(), rate_limits));
    (app, db)
}

/// Build a request with an optional bearer token and JSON body.
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Build a request that carries only the refresh cookie.
pub fn cookie_request(method: &str, uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// The `jwt=<token>` pair from a Set-Cookie header, ready to send back.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().trim().to_string()
}

/// A logged-in user as seen by the tests.
pub struct Session {
    pub id: i64,
    pub access_token: String,
    pub cookie: String,
}

pub async fn register(app: &Router, username: &str) -> Session {
    let response = send(
        app,
        request(
            "POST",
            "/api/v1/users",
            None,
            Some(serde_json::json!({"username": username, "password": PASSWORD})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    session_from(response).await
}

pub async fn login(app: &Router, username: &str) -> Session {
    let response = send(
        app,
        request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(serde_json::json!({"username": username, "password": PASSWORD})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    session_from(response).await
}

async fn session_from(response: Response<Body>) -> Session {
    let cookie = cookie_pair(&set_cookie(&response).expect("Missing Set-Cookie"));
    let json = body_json(response).await;
    Session {
        id: json["id"].as_i64().unwrap(),
        access_token: json["accessToken"].as_str().unwrap().to_string(),
        cookie,
    }
}

/// Register a user, promote them in the store, and log in again so the
/// access token carries the admin claim.
pub async fn register_admin(app: &Router, db: &Database, username: &str) -> Session {
    let session = register(app, username).await;
    let update = UserUpdate {
        is_admin: Some(true),
        ..Default::default()
    };
    assert!(db.users().update(session.id, &update).await.unwrap());
    login(app, username).await
}
