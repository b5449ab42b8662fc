use crate::auth::CartOwner;
use crate::entities::{cart, cart_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::catalog::CatalogService;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Identity-owned cart with reactive pruning of dangling product references.
///
/// The server cart is authoritative once identity is known; anonymous-session
/// carts merge into the customer cart at sign-in.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    catalog: CatalogService,
    events: EventSender,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: CatalogService,
        events: EventSender,
    ) -> Self {
        Self {
            db,
            catalog,
            events,
        }
    }

    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<cart::Model>, ServiceError> {
        let query = match owner {
            CartOwner::Customer(id) => {
                cart::Entity::find().filter(cart::Column::CustomerId.eq(*id))
            }
            CartOwner::Session(session) => {
                cart::Entity::find().filter(cart::Column::SessionId.eq(session.clone()))
            }
        };
        Ok(query.one(&*self.db).await?)
    }

    async fn items_of(&self, cart_id: Uuid) -> Result<Vec<cart_item::Model>, ServiceError> {
        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    pub async fn get_or_create(&self, owner: &CartOwner) -> Result<CartView, ServiceError> {
        if let Some(cart) = self.find_cart(owner).await? {
            let items = self.items_of(cart.id).await?;
            return Ok(CartView { cart, items });
        }

        let now = Utc::now();
        let (customer_id, session_id) = match owner {
            CartOwner::Customer(id) => (Some(*id), None),
            CartOwner::Session(session) => (None, Some(session.clone())),
        };
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            session_id: Set(session_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        Ok(CartView {
            cart,
            items: Vec::new(),
        })
    }

    /// Sets the quantity for a product. Zero removes the entry; the product
    /// must currently exist in the catalog for any positive quantity.
    #[instrument(skip(self, owner))]
    pub async fn set_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::Validation(
                "quantity must not be negative".to_string(),
            ));
        }

        let view = self.get_or_create(owner).await?;
        let cart_id = view.cart.id;

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        if quantity == 0 {
            if let Some(item) = existing {
                cart_item::Entity::delete_by_id(item.id)
                    .exec(&*self.db)
                    .await?;
            }
        } else {
            let found = self.catalog.find_by_ids(&[product_id]).await?;
            if found.is_empty() {
                return Err(ServiceError::NotFound(format!(
                    "Product {product_id} not found"
                )));
            }

            match existing {
                Some(item) => {
                    let mut active: cart_item::ActiveModel = item.into();
                    active.quantity = Set(quantity);
                    active.updated_at = Set(Utc::now());
                    active.update(&*self.db).await?;
                }
                None => {
                    cart_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        cart_id: Set(cart_id),
                        product_id: Set(product_id),
                        quantity: Set(quantity),
                        created_at: Set(Utc::now()),
                        updated_at: Set(Utc::now()),
                    }
                    .insert(&*self.db)
                    .await?;
                }
            }
        }

        let items = self.items_of(cart_id).await?;
        Ok(CartView {
            cart: view.cart,
            items,
        })
    }

    /// Reconciles the cart against the live catalog, dropping entries whose
    /// product was deleted or deactivated. Returns the pruned product ids.
    #[instrument(skip(self, owner))]
    pub async fn sync(&self, owner: &CartOwner) -> Result<(CartView, Vec<Uuid>), ServiceError> {
        let view = self.get_or_create(owner).await?;
        let ids: Vec<Uuid> = view.items.iter().map(|i| i.product_id).collect();
        let live = self.catalog.find_map_by_ids(&ids).await?;

        let mut removed = Vec::new();
        for item in &view.items {
            if !live.contains_key(&item.product_id) {
                cart_item::Entity::delete_by_id(item.id)
                    .exec(&*self.db)
                    .await?;
                removed.push(item.product_id);
            }
        }

        if !removed.is_empty() {
            info!(cart_id = %view.cart.id, removed = removed.len(), "pruned dangling cart entries");
            self.events
                .send(Event::CartPruned {
                    cart_id: view.cart.id,
                    removed: removed.clone(),
                })
                .await;
        }

        let items = self.items_of(view.cart.id).await?;
        Ok((
            CartView {
                cart: view.cart,
                items,
            },
            removed,
        ))
    }

    /// Folds an anonymous-session cart into the customer's cart after
    /// sign-in. Quantities for shared products are summed; the session cart
    /// is deleted; dangling references are pruned afterwards.
    #[instrument(skip(self))]
    pub async fn merge_into_customer(
        &self,
        session: &str,
        customer_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let customer_owner = CartOwner::Customer(customer_id);
        let target = self.get_or_create(&customer_owner).await?;

        if let Some(session_cart) = self
            .find_cart(&CartOwner::Session(session.to_string()))
            .await?
        {
            let session_items = self.items_of(session_cart.id).await?;
            for item in session_items {
                let existing = cart_item::Entity::find()
                    .filter(cart_item::Column::CartId.eq(target.cart.id))
                    .filter(cart_item::Column::ProductId.eq(item.product_id))
                    .one(&*self.db)
                    .await?;

                match existing {
                    Some(current) => {
                        let merged = current.quantity.saturating_add(item.quantity);
                        let mut active: cart_item::ActiveModel = current.into();
                        active.quantity = Set(merged);
                        active.updated_at = Set(Utc::now());
                        active.update(&*self.db).await?;
                    }
                    None => {
                        cart_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            cart_id: Set(target.cart.id),
                            product_id: Set(item.product_id),
                            quantity: Set(item.quantity),
                            created_at: Set(Utc::now()),
                            updated_at: Set(Utc::now()),
                        }
                        .insert(&*self.db)
                        .await?;
                    }
                }
            }

            cart_item::Entity::delete_many()
                .filter(cart_item::Column::CartId.eq(session_cart.id))
                .exec(&*self.db)
                .await?;
            cart::Entity::delete_by_id(session_cart.id)
                .exec(&*self.db)
                .await?;
            info!(session, %customer_id, "merged session cart into customer cart");
        }

        let (view, _) = self.sync(&customer_owner).await?;
        Ok(view)
    }

    pub async fn clear(&self, owner: &CartOwner) -> Result<(), ServiceError> {
        if let Some(cart) = self.find_cart(owner).await? {
            cart_item::Entity::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(&*self.db)
                .await?;
        }
        Ok(())
    }
}
