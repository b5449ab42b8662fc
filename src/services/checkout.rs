use crate::entities::order::{self, OrderStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::catalog::CatalogService;
use crate::services::gateway::{to_minor_units, ChargeStatus, PaymentGateway};
use crate::services::orders::{LineItemDraft, OrderDraft, OrderService};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Checkout orchestrator.
///
/// Owns the two state-changing flows of the payment lifecycle: turning a
/// submitted cart into a pending, price-frozen order with a hosted payment
/// session, and applying gateway confirmations to that order exactly once.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    catalog: CatalogService,
    orders: OrderService,
    gateway: Arc<PaymentGateway>,
    events: EventSender,
    delivery_fee: Decimal,
    currency: String,
    expiry_hours: i64,
}

/// A validated checkout submission. Prices are deliberately absent: the
/// orchestrator re-reads them from the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub delivery_address: String,
    pub note: Option<String>,
    pub entries: Vec<CheckoutEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutEntry {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Result of a successful submission: where to send the browser, plus the
/// identifiers the caller needs to track the order.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub order_id: Uuid,
    pub reference: String,
    pub checkout_url: String,
}

/// Outcome of applying a payment confirmation. Both confirmation channels
/// receive this and map it to their own response semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    /// This call won the `pending -> paid` transition.
    Applied,
    /// The order had already left `pending`; nothing was done.
    AlreadyApplied,
    /// The gateway did not report success; nothing was done.
    Rejected,
}

impl ConfirmationOutcome {
    /// Whether the order is (now or already) paid from the caller's view.
    pub fn is_paid(self) -> bool {
        matches!(self, Self::Applied | Self::AlreadyApplied)
    }
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: CatalogService,
        orders: OrderService,
        gateway: Arc<PaymentGateway>,
        events: EventSender,
        delivery_fee: Decimal,
        currency: String,
        expiry_hours: i64,
    ) -> Self {
        Self {
            db,
            catalog,
            orders,
            gateway,
            events,
            delivery_fee,
            currency,
            expiry_hours,
        }
    }

    /// Validates a cart against the live catalog, persists a pending order
    /// with prices frozen at this instant, and opens a hosted payment
    /// session.
    ///
    /// All-or-nothing: any dangling product reference fails the whole
    /// submission before anything is persisted. A gateway failure after
    /// persistence leaves the order `pending`; it stays re-payable until the
    /// expiry sweep claims it.
    #[instrument(skip(self, input), fields(entries = input.entries.len()))]
    pub async fn submit_checkout(
        &self,
        input: CheckoutInput,
    ) -> Result<CheckoutSession, ServiceError> {
        Self::validate(&input)?;

        let ids: Vec<Uuid> = input.entries.iter().map(|e| e.product_id).collect();
        let products = self.catalog.find_map_by_ids(&ids).await?;

        let mut items = Vec::with_capacity(input.entries.len());
        let mut subtotal = Decimal::ZERO;
        for entry in &input.entries {
            let product = products.get(&entry.product_id).ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", entry.product_id))
            })?;

            let unit_price = product.effective_price();
            subtotal += unit_price * Decimal::from(entry.quantity);
            items.push(LineItemDraft {
                product_id: product.id,
                name: product.name.clone(),
                category: product.category.clone(),
                unit_price,
                quantity: entry.quantity,
            });
        }
        let total_price = subtotal + self.delivery_fee;

        let created = self
            .orders
            .create(OrderDraft {
                customer_name: input.customer_name,
                email: input.email.clone(),
                phone: input.phone,
                delivery_address: input.delivery_address,
                note: input.note,
                currency: self.currency.clone(),
                total_price,
                items,
            })
            .await?;
        let order = created.order;

        self.events.send(Event::OrderCreated(order.id)).await;

        let checkout_url = self
            .gateway
            .initialize_transaction(
                &input.email,
                to_minor_units(total_price)?,
                &order.gateway_reference,
            )
            .await?;

        info!(order_id = %order.id, %total_price, "checkout session opened");
        Ok(CheckoutSession {
            order_id: order.id,
            reference: order.gateway_reference,
            checkout_url,
        })
    }

    /// Applies a payment confirmation idempotently.
    ///
    /// Invoked by both the redirect callback and the webhook, in any order
    /// and any number of times. The `pending -> paid` transition is a single
    /// conditional UPDATE, so concurrent confirmations race safely: exactly
    /// one caller observes `Applied` and the paid event fires once.
    #[instrument(skip(self))]
    pub async fn apply_payment_confirmation(
        &self,
        reference: &str,
        status: ChargeStatus,
    ) -> Result<ConfirmationOutcome, ServiceError> {
        let order = self
            .orders
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {reference} not found")))?;

        if status != ChargeStatus::Success {
            warn!(%reference, ?status, "gateway did not report success; no transition");
            return Ok(ConfirmationOutcome::Rejected);
        }

        let res = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&*self.db)
            .await?;

        if res.rows_affected == 0 {
            // Already paid, or already expired: either way the transition
            // happened elsewhere and this delivery is a duplicate.
            info!(order_id = %order.id, "confirmation already applied");
            return Ok(ConfirmationOutcome::AlreadyApplied);
        }

        info!(order_id = %order.id, "order transitioned to paid");
        self.events.send(Event::OrderPaid(order.id)).await;
        Ok(ConfirmationOutcome::Applied)
    }

    /// Sweeps pending orders older than the configured window into the
    /// terminal `expired` state. Paid orders are never touched.
    #[instrument(skip(self))]
    pub async fn expire_stale_pending(&self) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - Duration::hours(self.expiry_hours);

        let res = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Expired))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .filter(order::Column::CreatedAt.lt(cutoff))
            .exec(&*self.db)
            .await?;

        if res.rows_affected > 0 {
            self.events
                .send(Event::OrdersExpired {
                    count: res.rows_affected,
                })
                .await;
        }
        Ok(res.rows_affected)
    }

    fn validate(input: &CheckoutInput) -> Result<(), ServiceError> {
        let required = [
            ("customer_name", &input.customer_name),
            ("email", &input.email),
            ("phone", &input.phone),
            ("delivery_address", &input.delivery_address),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ServiceError::Validation(format!("{field} is required")));
            }
        }
        if input.entries.is_empty() {
            return Err(ServiceError::Validation("cart is empty".to_string()));
        }
        if let Some(entry) = input.entries.iter().find(|e| e.quantity < 1) {
            return Err(ServiceError::Validation(format!(
                "quantity for product {} must be at least 1",
                entry.product_id
            )));
        }
        Ok(())
    }
}
