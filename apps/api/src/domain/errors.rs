use thiserror::Error;
use uuid::Uuid;

/// Errors raised when a business rule is violated
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("Cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Errors surfaced by repository implementations
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique constraint was violated (name, email, phone, ...)
    #[error("Duplicate value: {0}")]
    Duplicate(String),

    /// The row is still referenced by another row
    #[error("Record is still referenced: {0}")]
    Conflict(String),

    /// The row no longer has the state the write was based on
    #[error("Record {0} was changed by another request")]
    Stale(Uuid),

    #[error("Insufficient stock for product {0}")]
    InsufficientStock(Uuid),

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
