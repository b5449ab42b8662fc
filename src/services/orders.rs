use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Durable order ledger: creation, queries, and back-office mutations.
/// Payment-state transitions live in the checkout service.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

/// Input for creating a price-frozen order. Prices here have already been
/// resolved against the catalog by the checkout orchestrator.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub delivery_address: String,
    pub note: Option<String>,
    pub currency: String,
    pub total_price: Decimal,
    pub items: Vec<LineItemDraft>,
}

#[derive(Debug, Clone)]
pub struct LineItemDraft {
    pub product_id: Uuid,
    pub name: String,
    pub category: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub items: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Sales figures over paid orders only. Item quantities are summed within
/// each order first, then across orders, so multi-line orders count once.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SalesSummary {
    pub revenue: Decimal,
    pub orders: u64,
    pub items_sold: u64,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Persists an order and its line items atomically, in `pending` status.
    /// The gateway reference is assigned from the order id.
    #[instrument(skip(self, draft), fields(total = %draft.total_price))]
    pub async fn create(&self, draft: OrderDraft) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let order = order::ActiveModel {
            id: Set(order_id),
            gateway_reference: Set(order_id.to_string()),
            customer_name: Set(draft.customer_name),
            email: Set(draft.email),
            phone: Set(draft.phone),
            delivery_address: Set(draft.delivery_address),
            note: Set(draft.note),
            total_price: Set(draft.total_price),
            currency: Set(draft.currency),
            status: Set(order::OrderStatus::Pending),
            seen: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&txn).await?;

        let mut items = Vec::with_capacity(draft.items.len());
        for line in draft.items {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                name: Set(line.name),
                category: Set(line.category),
                unit_price: Set(line.unit_price),
                quantity: Set(line.quantity),
                created_at: Set(now),
            };
            items.push(item.insert(&txn).await?);
        }

        txn.commit().await?;
        info!(%order_id, "order persisted as pending");
        Ok(OrderWithItems { order, items })
    }

    pub async fn get(&self, id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {id} not found")))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(id))
            .all(&*self.db)
            .await?;

        Ok(OrderWithItems { order, items })
    }

    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        let order = order::Entity::find()
            .filter(order::Column::GatewayReference.eq(reference))
            .one(&*self.db)
            .await?;
        Ok(order)
    }

    /// Newest-first page of orders. `page` is 1-based.
    pub async fn list(&self, page: u64, limit: u64) -> Result<OrderPage, ServiceError> {
        let limit = limit.clamp(1, 100);
        let page = page.max(1);

        let paginator = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok(OrderPage {
            items,
            total,
            page,
            limit,
        })
    }

    /// Unpaged list of orders staff have not looked at yet.
    pub async fn unseen(&self) -> Result<Vec<order::Model>, ServiceError> {
        let items = order::Entity::find()
            .filter(order::Column::Seen.eq(false))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    pub async fn mark_seen(&self, id: Uuid) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {id} not found")))?;

        let mut active: order::ActiveModel = order.into();
        active.seen = Set(true);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;
        Ok(updated)
    }

    /// Removes an order and its items. Administrative; independent of
    /// payment status.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(id))
            .exec(&txn)
            .await?;

        let res = order::Entity::delete_by_id(id).exec(&txn).await?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Order {id} not found")));
        }

        txn.commit().await?;
        info!(order_id = %id, "order deleted");
        Ok(())
    }

    pub async fn sales_summary(&self) -> Result<SalesSummary, ServiceError> {
        let paid = order::Entity::find()
            .filter(order::Column::Status.eq(order::OrderStatus::Paid))
            .all(&*self.db)
            .await?;

        let revenue = paid.iter().map(|o| o.total_price).sum::<Decimal>();
        let order_ids: Vec<Uuid> = paid.iter().map(|o| o.id).collect();

        let items_sold = if order_ids.is_empty() {
            0
        } else {
            order_item::Entity::find()
                .filter(order_item::Column::OrderId.is_in(order_ids))
                .all(&*self.db)
                .await?
                .iter()
                .map(|i| i.quantity as u64)
                .sum()
        };

        Ok(SalesSummary {
            revenue,
            orders: paid.len() as u64,
            items_sold,
        })
    }
}
