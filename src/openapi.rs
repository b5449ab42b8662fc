use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Spicedrop Storefront API",
        description = "Checkout, payment confirmation, and order back office"
    ),
    paths(
        crate::handlers::checkout::submit_checkout,
        crate::handlers::checkout::payment_callback,
        crate::handlers::checkout::payment_webhook,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::list_unseen,
        crate::handlers::orders::mark_seen,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::sales_stats,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::checkout::CheckoutRequest,
        crate::handlers::checkout::CartEntryRequest,
        crate::entities::order::OrderStatus,
    )),
    tags(
        (name = "Checkout", description = "Cart submission and payment confirmation"),
        (name = "Orders", description = "Order queries and back office")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
