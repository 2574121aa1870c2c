use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::customer::{Customer, CustomerContact, PhoneNumber};
use crate::domain::errors::RepositoryResult;
use crate::domain::pagination::{PageRequest, RecordScope};

/// Repository trait for customers
///
/// Phone numbers are unique across all customers, deleted or not.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn save(&self, customer: &Customer) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: Uuid, scope: RecordScope)
        -> RepositoryResult<Option<Customer>>;

    async fn find_by_phone(&self, phone: &PhoneNumber) -> RepositoryResult<Option<Customer>>;

    /// The live customer record linked to a user account
    async fn find_by_user(&self, user_id: Uuid) -> RepositoryResult<Option<Customer>>;

    /// Insert a customer for this phone, or merge the contact into the
    /// existing one (see [`Customer::merge_contact`]) in a single step
    async fn upsert_by_phone(&self, contact: CustomerContact) -> RepositoryResult<Customer>;

    /// One page of customers, newest first; keyword matches name or phone
    async fn list(
        &self,
        keyword: Option<&str>,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Customer>, u64)>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}
