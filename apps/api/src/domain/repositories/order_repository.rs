use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::RepositoryResult;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::pagination::{PageRequest, RecordScope};

/// Filters for order listings
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status() == s)
            && self.customer_id.map_or(true, |c| order.customer_id() == c)
            && self.user_id.map_or(true, |u| order.user_id() == Some(u))
    }
}

/// Repository trait for the Order aggregate
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order and decrement stock for each item atomically
    ///
    /// Fails with `InsufficientStock` (and writes nothing) when any product
    /// has less stock than requested or is no longer live.
    async fn place(&self, order: &Order) -> RepositoryResult<()>;

    /// Update status, payment and soft-delete fields of an existing order
    ///
    /// Fails with `Conflict` (and writes nothing) when the stored status or
    /// payment status no longer matches [`Order::persisted_state`].
    async fn save(&self, order: &Order) -> RepositoryResult<()>;

    /// Save a cancelled order and return its items to stock atomically
    ///
    /// Same `Conflict` rule as [`OrderRepository::save`]; a stored order
    /// that is already cancelled always conflicts.
    async fn cancel(&self, order: &Order) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Order>>;

    /// One page of orders, newest first
    async fn list(
        &self,
        filter: &OrderFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Order>, u64)>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}
