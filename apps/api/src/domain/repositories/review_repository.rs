use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::RepositoryResult;
use crate::domain::pagination::{PageRequest, RecordScope};
use crate::domain::review::Review;

/// Filters for review listings
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub product_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl ReviewFilter {
    pub fn matches(&self, review: &Review) -> bool {
        self.product_id.map_or(true, |p| review.product_id == p)
            && self.user_id.map_or(true, |u| review.user_id == u)
    }
}

/// Repository trait for product reviews
///
/// A user has at most one live review per product; saving a second one
/// yields `Duplicate`.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn save(&self, review: &Review) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Review>>;

    /// One page of reviews, newest first
    async fn list(
        &self,
        filter: &ReviewFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Review>, u64)>;

    /// Ratings of every live review of a product
    async fn live_ratings(&self, product_id: Uuid) -> RepositoryResult<Vec<i16>>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}
