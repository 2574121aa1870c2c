use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::catalog::Category;
use crate::domain::errors::RepositoryResult;
use crate::domain::pagination::{PageRequest, RecordScope};

/// Repository trait for product categories
///
/// Category names are unique; saving a taken name yields `Duplicate`.
/// Deleting a category that products still reference yields `Conflict`.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn save(&self, category: &Category) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: Uuid, scope: RecordScope)
        -> RepositoryResult<Option<Category>>;

    /// One page of categories ordered by name
    async fn list(
        &self,
        keyword: Option<&str>,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Category>, u64)>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}
