//! Stale-order sweep: abandoned pending orders become terminal `expired`.

mod common;

use axum::http::{Method, StatusCode};
use common::{assert_status_json, response_json, TestApp};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use spicedrop_api::entities::order;
use spicedrop_api::events::Event;
use spicedrop_api::services::gateway::ChargeStatus;
use uuid::Uuid;

async fn place_order(app: &TestApp) -> (Uuid, String) {
    let product = app.seed_product("Scotch Bonnet Flakes", dec!(600), None).await;
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
    (
        session["order_id"].as_str().unwrap().parse().unwrap(),
        session["reference"].as_str().unwrap().to_string(),
    )
}

async fn backdate(app: &TestApp, order_id: Uuid, hours: i64) {
    order::Entity::update_many()
        .col_expr(
            order::Column::CreatedAt,
            Expr::value(Utc::now() - Duration::hours(hours)),
        )
        .filter(order::Column::Id.eq(order_id))
        .exec(&*app.state.db)
        .await
        .unwrap();
}

#[tokio::test]
async fn sweep_expires_only_stale_pending_orders() {
    let mut app = TestApp::new().await;
    app.stub_initialize_success("https://pay.example.com/s").await;

    let (stale_id, _) = place_order(&app).await;
    let (fresh_id, _) = place_order(&app).await;
    let (paid_id, paid_ref) = place_order(&app).await;

    app.state
        .services
        .checkout
        .apply_payment_confirmation(&paid_ref, ChargeStatus::Success)
        .await
        .unwrap();

    // Default window is 24h; the paid order is old too but must survive.
    backdate(&app, stale_id, 30).await;
    backdate(&app, paid_id, 30).await;

    let swept = app
        .state
        .services
        .checkout
        .expire_stale_pending()
        .await
        .unwrap();
    assert_eq!(swept, 1);

    for (id, expected) in [
        (stale_id, "expired"),
        (fresh_id, "pending"),
        (paid_id, "paid"),
    ] {
        let body = response_json(
            app.request(Method::GET, &format!("/api/v1/orders/{id}"), None, &[])
                .await,
        )
        .await;
        assert_eq!(body["status"], expected, "order {id}");
    }

    assert!(app
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::OrdersExpired { count: 1 })));
}

#[tokio::test]
async fn sweep_with_nothing_stale_emits_nothing() {
    let mut app = TestApp::new().await;
    app.stub_initialize_success("https://pay.example.com/s").await;
    place_order(&app).await;

    let swept = app
        .state
        .services
        .checkout
        .expire_stale_pending()
        .await
        .unwrap();
    assert_eq!(swept, 0);
    assert!(!app
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::OrdersExpired { .. })));
}

#[tokio::test]
async fn late_webhook_for_expired_order_is_acknowledged_without_payment() {
    let mut app = TestApp::new().await;
    app.stub_initialize_success("https://pay.example.com/s").await;

    let (order_id, reference) = place_order(&app).await;
    backdate(&app, order_id, 48).await;
    app.state
        .services
        .checkout
        .expire_stale_pending()
        .await
        .unwrap();

    let body = serde_json::to_vec(&json!({
        "event": "charge.success",
        "data": { "reference": reference, "status": "success" }
    }))
    .unwrap();
    let sig = app.sign(&body);
    let response = app.deliver_webhook(body, Some(&sig)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let order = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None, &[])
            .await,
    )
    .await;
    assert_eq!(order["status"], "expired");
    assert!(!app
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::OrderPaid(_))));
}
