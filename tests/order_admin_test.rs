//! Back-office order ledger: admin gating, listing, seen-tracking,
//! deletion, and sales stats.

mod common;

use axum::http::{Method, StatusCode};
use common::{as_decimal, assert_status_json, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use spicedrop_api::services::gateway::ChargeStatus;

async fn place_order(app: &TestApp, quantity: i32) -> (String, String) {
    let product = app.seed_product("Dried Thyme", dec!(500), None).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "customer_name": "Ada Obi",
                "email": "ada@example.com",
                "phone": "+2348000000000",
                "delivery_address": "12 Market Rd, Lagos",
                "cart": [{ "product_id": product.id, "quantity": quantity }]
            })),
            &[],
        )
        .await;
    let session = assert_status_json(response, StatusCode::CREATED).await;
    (
        session["order_id"].as_str().unwrap().to_string(),
        session["reference"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn back_office_requires_the_admin_token() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/orders", None, &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::GET,
            "/api/v1/orders",
            None,
            &[("authorization", "Bearer wrong-token")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.request_admin(Method::GET, "/api/v1/orders", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn listing_is_paginated_newest_first() {
    let app = TestApp::new().await;
    app.stub_initialize_success("https://pay.example.com/s").await;

    for q in 1..=3 {
        place_order(&app, q).await;
    }

    let page = response_json(
        app.request_admin(Method::GET, "/api/v1/orders?page=1&limit=2", None)
            .await,
    )
    .await;
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);

    let page2 = response_json(
        app.request_admin(Method::GET, "/api/v1/orders?page=2&limit=2", None)
            .await,
    )
    .await;
    assert_eq!(page2["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unseen_shrinks_as_orders_are_marked() {
    let app = TestApp::new().await;
    app.stub_initialize_success("https://pay.example.com/s").await;

    let (first, _) = place_order(&app, 1).await;
    place_order(&app, 1).await;

    let unseen = response_json(
        app.request_admin(Method::GET, "/api/v1/orders/unseen", None)
            .await,
    )
    .await;
    assert_eq!(unseen.as_array().unwrap().len(), 2);

    let marked = response_json(
        app.request_admin(Method::PUT, &format!("/api/v1/orders/{first}/seen"), None)
            .await,
    )
    .await;
    assert_eq!(marked["seen"], true);

    let unseen = response_json(
        app.request_admin(Method::GET, "/api/v1/orders/unseen", None)
            .await,
    )
    .await;
    assert_eq!(unseen.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn deletion_removes_order_and_items() {
    let app = TestApp::new().await;
    app.stub_initialize_success("https://pay.example.com/s").await;

    let (order_id, _) = place_order(&app, 2).await;

    let response = app
        .request_admin(Method::DELETE, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{order_id}"), None, &[])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request_admin(Method::DELETE, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sales_stats_count_paid_orders_only() {
    let app = TestApp::new().await;
    app.stub_initialize_success("https://pay.example.com/s").await;

    let (_, paid_ref) = place_order(&app, 2).await; // 2*500 + 500 = 1500
    place_order(&app, 1).await; // stays pending

    app.state
        .services
        .checkout
        .apply_payment_confirmation(&paid_ref, ChargeStatus::Success)
        .await
        .unwrap();

    let stats = response_json(
        app.request_admin(Method::GET, "/api/v1/orders/stats", None)
            .await,
    )
    .await;
    assert_eq!(stats["orders"], 1);
    assert_eq!(stats["items_sold"], 2);
    assert_eq!(as_decimal(&stats["revenue"]), dec!(1500));
}
