//! Integration tests for the API server.

use std::sync::OnceLock;

use api::InMemoryBackends;
use api::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{Money, ProductRecord};
use fulfillment::UserProfile;
use metrics_exporter_prometheus::PrometheusHandle;
use store::ProductId;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

/// User 1 "alice" and product 1 priced at 100 with `quantity` units.
async fn setup(quantity: u64) -> (axum::Router, InMemoryBackends) {
    let (state, backends) = api::create_default_state(&Config::default());
    backends
        .users
        .add_user(UserProfile::new(1, "alice", "Alice Liddell"))
        .await;
    backends
        .inventory
        .insert_product(ProductRecord::new(
            ProductId::new(1),
            "Widget",
            Money::from_units(100),
            quantity,
        ))
        .await;

    let app = api::create_app(state, get_metrics_handle());
    (app, backends)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

fn post_order(body: serde_json::Value) -> Request<Body> {
    post_raw(serde_json::to_string(&body).unwrap())
}

fn post_raw(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup(10).await;

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_order() {
    let (app, backends) = setup(10).await;

    let (status, json) = send(
        &app,
        post_order(serde_json::json!({
            "user_id": 1,
            "product_id": 1,
            "product_count": 2
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "success");
    assert_eq!(json["amount"], 200);
    assert_eq!(json["username"], "alice");
    assert_eq!(json["product_count"], 2);
    assert!(json["failure_reason"].is_null());
    assert_eq!(backends.inventory.quantity(ProductId::new(1)).await, Some(8));
    assert_eq!(backends.publisher.message_count().await, 1);
}

#[tokio::test]
async fn test_create_and_get_order() {
    let (app, _) = setup(10).await;

    let (_, created) = send(
        &app,
        post_order(serde_json::json!({
            "user_id": 1,
            "product_id": 1,
            "product_count": 1
        })),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();

    let (status, json) = send(&app, get(&format!("/orders/{order_id}"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, created);
}

#[tokio::test]
async fn test_out_of_stock_is_created_as_failed() {
    let (app, backends) = setup(0).await;

    let (status, json) = send(
        &app,
        post_order(serde_json::json!({
            "user_id": 1,
            "product_id": 1,
            "product_count": 1
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "failed");
    assert!(
        json["failure_reason"]
            .as_str()
            .unwrap()
            .starts_with("insufficient stock")
    );
    assert_eq!(backends.publisher.message_count().await, 0);
}

#[tokio::test]
async fn test_create_order_validation() {
    let (app, backends) = setup(10).await;

    for body in [
        serde_json::json!({ "user_id": 1, "product_id": 1, "product_count": 0 }),
        // count beyond the signed 64-bit range every backend stores
        serde_json::json!({
            "user_id": 1,
            "product_id": 1,
            "product_count": 9_223_372_036_854_775_808u64
        }),
        // amount of 100 x 10^17 beyond that range
        serde_json::json!({
            "user_id": 1,
            "product_id": 1,
            "product_count": 100_000_000_000_000_000u64
        }),
        serde_json::json!({ "product_id": 1, "product_count": 1 }),
        serde_json::json!({ "user_id": 1, "product_count": 1 }),
    ] {
        let (status, json) = send(&app, post_order(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Validation"));
    }

    assert_eq!(backends.orders.order_count().await, 0);
}

#[tokio::test]
async fn test_demo_data_accepts_orders() {
    let (state, backends) = api::create_default_state(&Config::default());
    api::seed_demo_data(&backends.users, &backends.inventory).await;
    let app = api::create_app(state, get_metrics_handle());

    let (status, json) = send(
        &app,
        post_order(serde_json::json!({
            "user_id": 1,
            "product_id": 1,
            "product_count": 3
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "success");
    assert_eq!(json["username"], "demo");
    assert_eq!(backends.inventory.quantity(ProductId::new(1)).await, Some(7));
}

#[tokio::test]
async fn test_malformed_body() {
    let (app, _) = setup(10).await;

    let (status, json) = send(&app, post_raw("{not json".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, _) = send(
        &app,
        post_order(serde_json::json!({ "user_id": -1, "product_id": 1, "product_count": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let (app, _) = setup(10).await;

    let (status, json) = send(
        &app,
        post_order(serde_json::json!({
            "user_id": 42,
            "product_id": 1,
            "product_count": 1
        })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("user 42"));
}

#[tokio::test]
async fn test_payment_outage_is_unavailable() {
    let (app, backends) = setup(10).await;
    backends.payments.set_unavailable(true);

    let (status, _) = send(
        &app,
        post_order(serde_json::json!({
            "user_id": 1,
            "product_id": 1,
            "product_count": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // the order was still finalized and can be re-queried
    let (status, json) = send(&app, get("/orders?user_id=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["orders"][0]["status"], "failed");
}

#[tokio::test]
async fn test_publish_failure_is_server_error() {
    let (app, backends) = setup(10).await;
    backends.publisher.set_fail(true);

    let (status, _) = send(
        &app,
        post_order(serde_json::json!({
            "user_id": 1,
            "product_id": 1,
            "product_count": 1
        })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(backends.inventory.quantity(ProductId::new(1)).await, Some(9));
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let (app, _) = setup(10).await;

    let (status, json) = send(&app, get(&format!("/orders/{}", common::OrderId::new()))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("Order not found"));
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let (app, _) = setup(10).await;

    let (status, _) = send(&app, get("/orders/not-a-uuid")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_with_pagination() {
    let (app, backends) = setup(100).await;
    backends
        .users
        .add_user(UserProfile::new(2, "bob", "Bob Builder"))
        .await;

    for user_id in [1, 1, 1, 2] {
        let (status, _) = send(
            &app,
            post_order(serde_json::json!({
                "user_id": user_id,
                "product_id": 1,
                "product_count": 1
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send(&app, get("/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 4);
    assert_eq!(json["page"], 1);
    assert_eq!(json["per_page"], 10);

    let (_, json) = send(&app, get("/orders?user_id=1&page=2&per_page=2")).await;
    assert_eq!(json["total"], 3);
    assert_eq!(json["orders"].as_array().unwrap().len(), 1);
    assert_eq!(json["orders"][0]["user_id"], 1);

    let (_, json) = send(&app, get("/orders?user_id=2")).await;
    assert_eq!(json["orders"][0]["username"], "bob");
}

#[tokio::test]
async fn test_list_orders_rejects_bad_params() {
    let (app, _) = setup(10).await;

    for uri in [
        "/orders?page=0",
        "/orders?per_page=0",
        "/orders?per_page=101",
        "/orders?user_id=abc",
    ] {
        let (status, _) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup(10).await;

    send(
        &app,
        post_order(serde_json::json!({
            "user_id": 1,
            "product_id": 1,
            "product_count": 1
        })),
    )
    .await;

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}
