use crate::auth::AdminOnly;
use crate::handlers::common::{no_content_response, success_response, PaginationParams};
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use uuid::Uuid;

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/unseen", get(list_unseen))
        .route("/stats", get(sales_stats))
        .route("/:id", get(get_order).delete(delete_order))
        .route("/:id/seen", put(mark_seen))
}

/// Order status query for the storefront (payment result page polls this).
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with line items"),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.get(id).await?;
    Ok(success_response(order))
}

/// Paginated back-office order list, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of orders"),
        (status = 401, description = "Missing admin token", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    _admin: AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state.services.orders.list(params.page, params.limit).await?;
    Ok(success_response(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/unseen",
    responses((status = 200, description = "Orders staff have not reviewed yet")),
    tag = "Orders"
)]
pub async fn list_unseen(
    _admin: AdminOnly,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.unseen().await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/seen",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order marked as seen"),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn mark_seen(
    _admin: AdminOnly,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.mark_seen(id).await?;
    Ok(success_response(order))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    _admin: AdminOnly,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.orders.delete(id).await?;
    Ok(no_content_response())
}

/// Aggregate sales totals over paid orders.
#[utoipa::path(
    get,
    path = "/api/v1/orders/stats",
    responses((status = 200, description = "Revenue, order count, and items sold")),
    tag = "Orders"
)]
pub async fn sales_stats(
    _admin: AdminOnly,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.orders.sales_summary().await?;
    Ok(success_response(summary))
}
