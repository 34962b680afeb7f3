//! Category slug lookup.

use ledgerline_core::ledger::LedgerError;
use ledgerline_shared::types::CategoryId;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entities::categories;
use crate::error::store_error;

/// Category repository.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    db: DatabaseConnection,
}

impl CategoryRepository {
    /// Creates a new category repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Category ID for a slug, case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn find_id_by_slug(&self, slug: &str) -> Result<Option<CategoryId>, LedgerError> {
        let id: Option<Uuid> = categories::Entity::find()
            .select_only()
            .column(categories::Column::Id)
            .filter(categories::Column::Slug.eq(slug.trim().to_lowercase()))
            .into_tuple()
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(id.map(CategoryId::from_uuid))
    }
}
