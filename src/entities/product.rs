use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product. The checkout core reads this as the single source of
/// truth for pricing; client-submitted prices are never trusted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub category: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    pub is_promotional: bool,
    /// Present and below `price` whenever `is_promotional` is set.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub discounted_price: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Promotional price when the promotion is active, list price otherwise.
    pub fn effective_price(&self) -> Decimal {
        if self.is_promotional {
            self.discounted_price.unwrap_or(self.price)
        } else {
            self.price
        }
    }
}
