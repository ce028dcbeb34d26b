mod common;

use axum::http::StatusCode;
use common::*;
use invoicer::{BANNER, start_server};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn test_banner() {
    let (app, _db) = create_test_app().await;

    let response = send(&app, request("GET", "/", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, BANNER);
}

#[tokio::test]
async fn test_unknown_path() {
    let (app, _db) = create_test_app().await;

    let response = send(&app, request("GET", "/api/v1/nope", None, None)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["message"],
        "404: Invalid path \"/api/v1/nope\""
    );
}

#[tokio::test]
async fn test_customer_crud() {
    let (app, _db) = create_test_app().await;
    let alice = register(&app, "alice").await;
    let token = Some(alice.access_token.as_str());

    let missing = send(
        &app,
        request("POST", "/api/v1/customers", token, Some(json!({"firstName": "Ada"}))),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(missing).await["message"], "Field lastName required");

    let created = send(
        &app,
        request(
            "POST",
            "/api/v1/customers",
            token,
            Some(json!({"firstName": "Ada", "lastName": "Lovelace"})),
        ),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = body_json(created).await;
    let uri = format!("/api/v1/customers/{}", created["id"]);

    let updated = send(
        &app,
        request(
            "PUT",
            &uri,
            token,
            Some(json!({"firstName": "Ada", "lastName": "King", "address": "London"})),
        ),
    )
    .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = body_json(updated).await;
    assert_eq!(updated["lastName"], "King");
    assert_eq!(updated["address"], "London");

    let deleted = send(&app, request("DELETE", &uri, token, None)).await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = send(&app, request("GET", &uri, token, None)).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_validation() {
    let (app, _db) = create_test_app().await;
    let alice = register(&app, "alice").await;
    let token = Some(alice.access_token.as_str());

    let no_title = send(
        &app,
        request("POST", "/api/v1/products", token, Some(json!({"price": 2.0}))),
    )
    .await;
    assert_eq!(no_title.status(), StatusCode::BAD_REQUEST);

    let negative = send(
        &app,
        request(
            "POST",
            "/api/v1/products",
            token,
            Some(json!({"title": "Mug", "price": -1.0})),
        ),
    )
    .await;
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_referenced_customer_cannot_be_deleted() {
    let (app, _db) = create_test_app().await;
    let alice = register(&app, "alice").await;
    let token = Some(alice.access_token.as_str());

    let customer = send(
        &app,
        request(
            "POST",
            "/api/v1/customers",
            token,
            Some(json!({"firstName": "Ada", "lastName": "Lovelace"})),
        ),
    )
    .await;
    let customer_id = body_json(customer).await["id"].as_i64().unwrap();

    let order = send(
        &app,
        request(
            "POST",
            "/api/v1/orders",
            token,
            Some(json!({"customerId": customer_id, "products": []})),
        ),
    )
    .await;
    assert_eq!(order.status(), StatusCode::CREATED);

    let response = send(
        &app,
        request(
            "DELETE",
            &format!("/api/v1/customers/{}", customer_id),
            token,
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_served_over_tcp() {
    let db = invoicer::db::Database::open(":memory:").await.unwrap();
    let (handle, addr) = start_server(test_config(db, RELAXED_LIMITS), 0).await.unwrap();

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with(BANNER));
    handle.abort();
}
