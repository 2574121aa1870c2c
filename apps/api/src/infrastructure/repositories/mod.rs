// Repository implementations (data access layer)
// Adapters that implement domain repository interfaces

pub mod memory_store;
pub mod postgres_address_repository;
pub mod postgres_category_repository;
pub mod postgres_customer_repository;
pub mod postgres_order_repository;
pub mod postgres_product_repository;
pub mod postgres_review_repository;
pub mod postgres_supplier_repository;
pub mod postgres_user_repository;

pub use memory_store::MemoryStore;
pub use postgres_address_repository::PostgresAddressRepository;
pub use postgres_category_repository::PostgresCategoryRepository;
pub use postgres_customer_repository::PostgresCustomerRepository;
pub use postgres_order_repository::PostgresOrderRepository;
pub use postgres_product_repository::PostgresProductRepository;
pub use postgres_review_repository::PostgresReviewRepository;
pub use postgres_supplier_repository::PostgresSupplierRepository;
pub use postgres_user_repository::PostgresUserRepository;

use crate::domain::errors::RepositoryError;
use crate::domain::pagination::RecordScope;

/// Maps a sqlx error onto the repository error vocabulary
///
/// - `23505` unique_violation -> `Duplicate`
/// - `23503` foreign_key_violation -> `Conflict`
pub(crate) fn map_db_error(context: &str, err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => {
                return RepositoryError::Duplicate(db.constraint().unwrap_or(context).to_string())
            }
            Some("23503") => {
                return RepositoryError::Conflict(db.constraint().unwrap_or(context).to_string())
            }
            _ => {}
        }
    }
    RepositoryError::Database(format!("{}: {}", context, err))
}

/// SQL predicate selecting rows in `scope`
pub(crate) fn scope_predicate(scope: RecordScope) -> &'static str {
    match scope {
        RecordScope::Active => "is_deleted = FALSE",
        RecordScope::Deleted => "is_deleted = TRUE",
        RecordScope::Any => "TRUE",
    }
}

/// `%keyword%` with LIKE wildcards in the keyword escaped
pub(crate) fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Converts a COUNT(*) result into the unsigned total used by pages
pub(crate) fn to_total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

pub(crate) fn corrupt(field: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Database(format!("Invalid {} from database: {}", field, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" 50%_off "), "%50\\%\\_off%");
    }

    #[test]
    fn scope_predicates() {
        assert_eq!(scope_predicate(RecordScope::Active), "is_deleted = FALSE");
        assert_eq!(scope_predicate(RecordScope::Deleted), "is_deleted = TRUE");
        assert_eq!(scope_predicate(RecordScope::Any), "TRUE");
    }

    #[test]
    fn negative_count_is_zero() {
        assert_eq!(to_total(-1), 0);
        assert_eq!(to_total(42), 42);
    }
}
