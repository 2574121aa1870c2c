use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::catalog::{Product, ProductFilter, RatingSummary};
use crate::domain::errors::RepositoryResult;
use crate::domain::pagination::{PageRequest, RecordScope};

/// Repository trait for products
///
/// Stock changes caused by orders go through
/// [`OrderRepository`](super::OrderRepository) so they stay atomic with the
/// order write.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Inserts or updates catalog fields and stock; the rating is left to
    /// [`ProductRepository::set_rating`]
    async fn save(&self, product: &Product) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Product>>;

    /// Live products among `ids`, in no particular order
    async fn find_many(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Product>>;

    async fn list(
        &self,
        filter: &ProductFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Product>, u64)>;

    /// Writes only the review aggregate, leaving stock and catalog fields alone
    async fn set_rating(&self, id: Uuid, summary: RatingSummary) -> RepositoryResult<()>;

    /// Moves a product to or from the trash without touching any other field
    ///
    /// Returns false when no product with the opposite flag exists.
    async fn set_deleted(&self, id: Uuid, deleted: bool) -> RepositoryResult<bool>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}
