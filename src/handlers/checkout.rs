use crate::handlers::common::{created_response, validate_input};
use crate::services::checkout::{CheckoutEntry, CheckoutInput, CheckoutSession};
use crate::services::gateway::{ChargeStatus, WebhookEvent, CHARGE_SUCCESS, SIGNATURE_HEADER};
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_checkout))
        .route("/callback", get(payment_callback))
        .route("/webhook", post(payment_webhook))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[validate(length(min = 1))]
    pub customer_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub delivery_address: String,
    pub note: Option<String>,
    #[validate(length(min = 1, message = "cart must not be empty"))]
    pub cart: Vec<CartEntryRequest>,
}

#[derive(Debug, Deserialize, serde::Serialize, ToSchema)]
pub struct CartEntryRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Submit a cart for checkout.
///
/// Prices are recomputed server-side from the live catalog; the response
/// carries the hosted payment page to redirect the customer to.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Pending order created, payment session opened"),
        (status = 400, description = "Missing fields or empty cart", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart references a product that no longer exists", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment session could not be created", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn submit_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let session: CheckoutSession = state
        .services
        .checkout
        .submit_checkout(CheckoutInput {
            customer_name: payload.customer_name,
            email: payload.email,
            phone: payload.phone,
            delivery_address: payload.delivery_address,
            note: payload.note,
            entries: payload
                .cart
                .into_iter()
                .map(|e| CheckoutEntry {
                    product_id: e.product_id,
                    quantity: e.quantity,
                })
                .collect(),
        })
        .await?;

    Ok(created_response(session))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub reference: Option<String>,
}

/// Browser redirect target after hosted payment.
///
/// A dead-end UX flow, never JSON: the transaction is re-verified against
/// the gateway server-side (the querystring status is untrusted) and the
/// browser is sent to the configured success, failure, or error page.
#[utoipa::path(
    get,
    path = "/api/v1/checkout/callback",
    params(("reference" = Option<String>, Query, description = "Gateway transaction reference")),
    responses((status = 303, description = "Redirect to the storefront result page")),
    tag = "Checkout"
)]
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackQuery>,
) -> Redirect {
    let Some(reference) = params.reference.filter(|r| !r.is_empty()) else {
        warn!("payment callback without reference");
        return Redirect::to(&state.config.checkout_error_url);
    };

    let status = match state.services.gateway.verify_transaction(&reference).await {
        Ok(status) => status,
        Err(e) => {
            error!(%reference, "gateway verification failed on callback: {}", e);
            return Redirect::to(&state.config.checkout_error_url);
        }
    };

    match state
        .services
        .checkout
        .apply_payment_confirmation(&reference, status)
        .await
    {
        Ok(outcome) if outcome.is_paid() => Redirect::to(&state.config.checkout_success_url),
        Ok(_) => Redirect::to(&state.config.checkout_failure_url),
        Err(e) => {
            error!(%reference, "failed applying callback confirmation: {}", e);
            Redirect::to(&state.config.checkout_error_url)
        }
    }
}

/// Server-to-server payment notification.
///
/// Signature verification runs over the raw request bytes before any
/// parsing. Responds 200 once processed or determined not applicable (an
/// unknown reference will never resolve by retrying); non-200 is reserved
/// for bad signatures and genuine processing failures.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Acknowledged"),
        (status = 400, description = "Invalid signature or payload", body = crate::errors::ErrorResponse),
        (status = 500, description = "Processing failed; the gateway should retry", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServiceError::InvalidSignature)?;

    if !state
        .services
        .gateway
        .verify_webhook_signature(&body, signature)
    {
        warn!("webhook signature verification failed");
        return Err(ServiceError::InvalidSignature);
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::Validation(format!("invalid webhook payload: {e}")))?;

    if event.event != CHARGE_SUCCESS {
        info!(event = %event.event, "unhandled webhook event");
        return Ok(StatusCode::OK);
    }

    match state
        .services
        .checkout
        .apply_payment_confirmation(&event.data.reference, ChargeStatus::Success)
        .await
    {
        // Applied, already applied, rejected: all acknowledged so the
        // gateway stops retrying.
        Ok(_) => Ok(StatusCode::OK),
        Err(ServiceError::NotFound(_)) => {
            warn!(reference = %event.data.reference, "webhook for unknown reference acknowledged");
            Ok(StatusCode::OK)
        }
        Err(e) => Err(e),
    }
}
