use crate::auth::Identity;
use crate::handlers::common::{no_content_response, success_response, validate_input};
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", put(set_item))
        .route("/sync", post(sync_cart))
        .route("/merge", post(merge_cart))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetItemRequest {
    pub product_id: Uuid,
    /// Zero removes the entry.
    #[validate(range(min = 0))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MergeCartRequest {
    /// Anonymous session whose cart folds into the caller's cart.
    #[validate(length(min = 1))]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse<T: Serialize> {
    #[serde(flatten)]
    pub cart: T,
    pub removed_product_ids: Vec<Uuid>,
}

pub async fn get_cart(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = identity.cart_owner()?;
    let view = state.services.cart.get_or_create(&owner).await?;
    Ok(success_response(view))
}

pub async fn set_item(
    identity: Identity,
    State(state): State<AppState>,
    Json(payload): Json<SetItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let owner = identity.cart_owner()?;
    let view = state
        .services
        .cart
        .set_item(&owner, payload.product_id, payload.quantity)
        .await?;
    Ok(success_response(view))
}

/// Reconcile the cart against the live catalog, pruning entries whose
/// product has been deleted.
pub async fn sync_cart(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = identity.cart_owner()?;
    let (view, removed) = state.services.cart.sync(&owner).await?;
    Ok(success_response(SyncResponse {
        cart: view,
        removed_product_ids: removed,
    }))
}

/// Fold an anonymous-session cart into the authenticated caller's cart.
/// The server cart is authoritative once identity is known.
pub async fn merge_cart(
    identity: Identity,
    State(state): State<AppState>,
    Json(payload): Json<MergeCartRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let Identity::User(customer_id) = identity else {
        return Err(ServiceError::Unauthorized(
            "cart merge requires an authenticated user".to_string(),
        ));
    };
    let view = state
        .services
        .cart
        .merge_into_customer(&payload.session_id, customer_id)
        .await?;
    Ok(success_response(view))
}

pub async fn clear_cart(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = identity.cart_owner()?;
    state.services.cart.clear(&owner).await?;
    Ok(no_content_response())
}
