//! Webhook hardening: signature enforcement and acknowledgement policy.

mod common;

use axum::http::{Method, StatusCode};
use common::{assert_status_json, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use spicedrop_api::events::Event;

async fn pending_order(app: &TestApp) -> String {
    app.stub_initialize_success("https://pay.example.com/s").await;
    let product = app.seed_product("Grains of Selim", dec!(1100), None).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "customer_name": "Ada Obi",
                "email": "ada@example.com",
                "phone": "+2348000000000",
                "delivery_address": "12 Market Rd, Lagos",
                "cart": [{ "product_id": product.id, "quantity": 1 }]
            })),
            &[],
        )
        .await;
    let session = assert_status_json(response, StatusCode::CREATED).await;
    session["reference"].as_str().unwrap().to_string()
}

fn success_body(reference: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": "charge.success",
        "data": { "reference": reference, "status": "success" }
    }))
    .unwrap()
}

#[tokio::test]
async fn missing_or_invalid_signature_is_rejected_without_mutation() {
    let mut app = TestApp::new().await;
    let reference = pending_order(&app).await;
    let body = success_body(&reference);

    let response = app.deliver_webhook(body.clone(), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.deliver_webhook(body.clone(), Some("deadbeef")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Valid signature over different bytes must not transfer.
    let other_sig = app.sign(b"{}");
    let response = app.deliver_webhook(body, Some(&other_sig)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let order = response_json(app.request_admin(Method::GET, "/api/v1/orders", None).await).await;
    assert_eq!(order["items"][0]["status"], "pending");
    assert!(
        !app.drain_events()
            .iter()
            .any(|e| matches!(e, Event::OrderPaid(_))),
        "rejected webhooks must not emit a paid event"
    );
}

#[tokio::test]
async fn unknown_reference_is_acknowledged() {
    let app = TestApp::new().await;

    // Retrying can never resolve an unknown reference, so the gateway gets
    // a 200 and stops redelivering.
    let body = success_body("no-such-order");
    let sig = app.sign(&body);
    let response = app.deliver_webhook(body, Some(&sig)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unrelated_events_are_acknowledged_without_transition() {
    let mut app = TestApp::new().await;
    let reference = pending_order(&app).await;

    let body = serde_json::to_vec(&json!({
        "event": "transfer.success",
        "data": { "reference": reference }
    }))
    .unwrap();
    let sig = app.sign(&body);
    let response = app.deliver_webhook(body, Some(&sig)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = response_json(app.request_admin(Method::GET, "/api/v1/orders", None).await).await;
    assert_eq!(page["items"][0]["status"], "pending");
    assert!(!app
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::OrderPaid(_))));
}

#[tokio::test]
async fn malformed_payload_with_valid_signature_is_bad_request() {
    let app = TestApp::new().await;

    let body = b"not json at all".to_vec();
    let sig = app.sign(&body);
    let response = app.deliver_webhook(body, Some(&sig)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
