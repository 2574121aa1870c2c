use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::customer::Address;
use crate::domain::errors::RepositoryResult;
use crate::domain::pagination::{PageRequest, RecordScope};

/// Repository trait for delivery addresses
#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// Insert or update an address
    ///
    /// When the saved address is a live default, every other default
    /// address of the same customer is cleared in the same transaction.
    async fn save(&self, address: &Address) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Address>>;

    /// One page of a customer's addresses, default first then newest
    async fn list_by_customer(
        &self,
        customer_id: Uuid,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Address>, u64)>;

    /// One page across all customers (deleted-list view)
    async fn list(
        &self,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Address>, u64)>;

    /// Number of live addresses the customer has
    async fn count_live(&self, customer_id: Uuid) -> RepositoryResult<u64>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}
