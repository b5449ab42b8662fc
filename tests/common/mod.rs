use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use sha2::Sha512;
use spicedrop_api::{
    config::AppConfig,
    db,
    entities::product,
    events::{Event, EventSender},
    handlers::AppServices,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

pub const ADMIN_TOKEN: &str = "test_admin_token_that_is_long_enough_0000";
const GATEWAY_SECRET: &str = "sk_test_webhook_secret";

/// Harness spinning up the app over a fresh file-backed SQLite database and
/// a mocked payment gateway.
///
/// The event channel receiver is held here rather than consumed by a
/// background task, so tests can assert exactly which events fired.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: MockServer,
    events: mpsc::Receiver<Event>,
    db_file: std::path::PathBuf,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let gateway = MockServer::start().await;

        let db_file = std::env::temp_dir().join(format!("spicedrop_test_{}.db", Uuid::new_v4()));
        let cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            ADMIN_TOKEN,
            gateway.uri(),
            GATEWAY_SECRET,
        );

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);

        let services = AppServices::new(db_arc.clone(), event_sender.clone(), &cfg)
            .expect("failed to build test services");

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .route("/", get(|| async { "spicedrop-api up" }))
            .nest("/api/v1", spicedrop_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            gateway,
            events: event_rx,
            db_file,
        }
    }

    /// Stub the gateway to open a hosted payment session at `checkout_url`.
    pub async fn stub_initialize_success(&self, checkout_url: &str) {
        Mock::given(method("POST"))
            .and(path("/transaction/initialize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": true,
                "data": { "authorization_url": checkout_url }
            })))
            .mount(&self.gateway)
            .await;
    }

    pub async fn stub_initialize_failure(&self) {
        Mock::given(method("POST"))
            .and(path("/transaction/initialize"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&self.gateway)
            .await;
    }

    /// Stub the server-side verification endpoint to report `status` for
    /// every reference.
    pub async fn stub_verify(&self, status: &str) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/transaction/verify/.+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": true,
                "data": { "status": status }
            })))
            .mount(&self.gateway)
            .await;
    }

    pub async fn stub_verify_error(&self) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/transaction/verify/.+$"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.gateway)
            .await;
    }

    /// Send a request with optional JSON body and extra headers.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Request with the back-office admin token.
    #[allow(dead_code)]
    pub async fn request_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let auth = format!("Bearer {ADMIN_TOKEN}");
        self.request(method, uri, body, &[("authorization", &auth)])
            .await
    }

    /// Deliver a webhook with the exact raw bytes and given signature header.
    #[allow(dead_code)]
    pub async fn deliver_webhook(&self, raw_body: Vec<u8>, signature: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/checkout/webhook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header("x-gateway-signature", sig);
        }
        let request = builder
            .body(Body::from(raw_body))
            .expect("failed to build webhook request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook delivery")
    }

    /// HMAC-SHA512 signature over the raw payload, as the gateway computes it.
    #[allow(dead_code)]
    pub fn sign(&self, raw_body: &[u8]) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(GATEWAY_SECRET.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(raw_body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Drain every event emitted so far.
    #[allow(dead_code)]
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Insert a catalog product directly.
    #[allow(dead_code)]
    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        discounted: Option<Decimal>,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            category: Set("spices".to_string()),
            price: Set(price),
            is_promotional: Set(discounted.is_some()),
            discounted_price: Set(discounted),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_file);
    }
}

/// Parse a response body as JSON.
#[allow(dead_code)]
pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Assert status, returning the JSON body for further checks.
#[allow(dead_code)]
pub async fn assert_status_json(response: Response, expected: StatusCode) -> Value {
    assert_eq!(response.status(), expected);
    response_json(response).await
}

/// Read a decimal field regardless of whether it serialized as a string or
/// a bare number.
#[allow(dead_code)]
pub fn as_decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected decimal value, got {other:?}"),
    }
}
