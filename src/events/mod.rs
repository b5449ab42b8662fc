use crate::entities::{order, order_item};
use crate::services::notifications::NotificationService;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Domain events emitted by the services. Consumed by a single in-process
/// task; delivery is best-effort and never blocks the emitting request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    /// Emitted exactly once per order, by whichever confirmation channel
    /// wins the `pending -> paid` transition.
    OrderPaid(Uuid),
    OrdersExpired {
        count: u64,
    },
    CartPruned {
        cart_id: Uuid,
        removed: Vec<Uuid>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging (not propagating) delivery failure.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            error!("failed to enqueue event: {}", e);
        }
    }
}

/// Event consumer loop. Dispatches the order-confirmation email when an
/// order is paid; everything else is logged for observability.
pub async fn process_events(
    mut receiver: mpsc::Receiver<Event>,
    db: Arc<DatabaseConnection>,
    notifier: Option<Arc<NotificationService>>,
) {
    while let Some(event) = receiver.recv().await {
        match event {
            Event::OrderCreated(order_id) => {
                info!(%order_id, "order created");
            }
            Event::OrderPaid(order_id) => {
                info!(%order_id, "order paid");
                if let Some(notifier) = notifier.as_ref() {
                    send_confirmation(&db, notifier, order_id).await;
                }
            }
            Event::OrdersExpired { count } => {
                info!(count, "stale pending orders expired");
            }
            Event::CartPruned { cart_id, removed } => {
                info!(%cart_id, removed = removed.len(), "cart entries pruned");
            }
        }
    }
}

async fn send_confirmation(
    db: &DatabaseConnection,
    notifier: &NotificationService,
    order_id: Uuid,
) {
    let order = match order::Entity::find_by_id(order_id).one(db).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            warn!(%order_id, "paid order vanished before confirmation email");
            return;
        }
        Err(e) => {
            error!(%order_id, "failed loading order for confirmation email: {}", e);
            return;
        }
    };

    let items = match order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(db)
        .await
    {
        Ok(items) => items,
        Err(e) => {
            error!(%order_id, "failed loading order items for confirmation email: {}", e);
            return;
        }
    };

    if let Err(e) = notifier.send_order_confirmation(&order, &items).await {
        // Best-effort: the paid transition is already committed and must
        // not be rolled back or retried because mail delivery failed.
        error!(%order_id, "order confirmation email failed: {}", e);
    }
}
