//! Redirect callback: always a browser redirect, never JSON, with the
//! gateway re-verified server-side.

mod common;

use axum::http::{Method, StatusCode};
use common::{assert_status_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn pending_order(app: &TestApp) -> String {
    app.stub_initialize_success("https://pay.example.com/s").await;
    let product = app.seed_product("Uziza Seed", dec!(950), None).await;
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

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("location")
        .expect("redirect location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn verified_payment_redirects_to_success_page() {
    let app = TestApp::new().await;
    let reference = pending_order(&app).await;
    app.stub_verify("success").await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/checkout/callback?reference={reference}"),
            None,
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), app.state.config.checkout_success_url);

    // The transition happened through the callback channel.
    let page = common::response_json(
        app.request_admin(Method::GET, "/api/v1/orders", None).await,
    )
    .await;
    assert_eq!(page["items"][0]["status"], "paid");
}

#[tokio::test]
async fn unverified_payment_redirects_to_failure_page() {
    let app = TestApp::new().await;
    let reference = pending_order(&app).await;
    app.stub_verify("abandoned").await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/checkout/callback?reference={reference}"),
            None,
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), app.state.config.checkout_failure_url);
}

#[tokio::test]
async fn missing_reference_or_gateway_error_redirects_to_error_page() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/checkout/callback", None, &[])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), app.state.config.checkout_error_url);

    let reference = pending_order(&app).await;
    app.stub_verify_error().await;
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/checkout/callback?reference={reference}"),
            None,
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), app.state.config.checkout_error_url);
}

#[tokio::test]
async fn callback_after_webhook_still_lands_on_success_page() {
    let app = TestApp::new().await;
    let reference = pending_order(&app).await;
    app.stub_verify("success").await;

    // Webhook wins first.
    let body = serde_json::to_vec(&json!({
        "event": "charge.success",
        "data": { "reference": reference, "status": "success" }
    }))
    .unwrap();
    let sig = app.sign(&body);
    let response = app.deliver_webhook(body, Some(&sig)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The late callback still shows the customer a success page.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/checkout/callback?reference={reference}"),
            None,
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), app.state.config.checkout_success_url);
}
