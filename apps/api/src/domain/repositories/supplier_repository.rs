use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::catalog::Supplier;
use crate::domain::errors::RepositoryResult;
use crate::domain::pagination::{PageRequest, RecordScope};

/// Repository trait for suppliers
#[async_trait]
pub trait SupplierRepository: Send + Sync {
    async fn save(&self, supplier: &Supplier) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: Uuid, scope: RecordScope)
        -> RepositoryResult<Option<Supplier>>;

    /// One page of suppliers ordered by name
    async fn list(
        &self,
        keyword: Option<&str>,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Supplier>, u64)>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}
