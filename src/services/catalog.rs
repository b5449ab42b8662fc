use crate::entities::product;
use crate::errors::ServiceError;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Read-side catalog lookup. Carts and checkout both re-read authoritative
/// product state through this service; a product that was deleted or
/// deactivated is simply absent from the result.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Batch-fetches current records for the given product ids.
    #[instrument(skip(self))]
    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<product::Model>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(ids.iter().copied()))
            .filter(product::Column::IsActive.eq(true))
            .all(&*self.db)
            .await?;
        Ok(products)
    }

    /// Same as [`find_by_ids`](Self::find_by_ids), keyed by product id.
    pub async fn find_map_by_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
        let products = self.find_by_ids(ids).await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }
}
