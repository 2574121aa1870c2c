use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{corrupt, like_pattern, map_db_error, scope_predicate, to_total};
use crate::domain::catalog::Supplier;
use crate::domain::customer::value_objects::PhoneNumber;
use crate::domain::errors::{RepositoryError, RepositoryResult};
use crate::domain::pagination::{PageRequest, RecordScope};
use crate::domain::repositories::SupplierRepository;
use crate::domain::user::value_objects::Email;

const SUPPLIER_COLUMNS: &str =
    "id, name, email, phone, address, is_deleted, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct SupplierRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SupplierRow> for Supplier {
    type Error = RepositoryError;

    fn try_from(r: SupplierRow) -> Result<Self, Self::Error> {
        Ok(Supplier {
            id: r.id,
            name: r.name,
            email: r
                .email
                .map(Email::new)
                .transpose()
                .map_err(|e| corrupt("email", e))?,
            phone: r
                .phone
                .map(PhoneNumber::new)
                .transpose()
                .map_err(|e| corrupt("phone", e))?,
            address: r.address,
            is_deleted: r.is_deleted,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// PostgreSQL implementation of SupplierRepository
pub struct PostgresSupplierRepository {
    pool: PgPool,
}

impl PostgresSupplierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, keyword: Option<&str>, scope: RecordScope) {
    query.push(" WHERE ").push(scope_predicate(scope));
    if let Some(keyword) = keyword.filter(|k| !k.trim().is_empty()) {
        query.push(" AND name ILIKE ").push_bind(like_pattern(keyword));
    }
}

#[async_trait]
impl SupplierRepository for PostgresSupplierRepository {
    async fn save(&self, supplier: &Supplier) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, email, phone, address, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                address = EXCLUDED.address,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(supplier.id)
        .bind(&supplier.name)
        .bind(supplier.email.as_ref().map(Email::as_str))
        .bind(supplier.phone.as_ref().map(PhoneNumber::as_str))
        .bind(&supplier.address)
        .bind(supplier.is_deleted)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to save supplier", e))?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        scope: RecordScope,
    ) -> RepositoryResult<Option<Supplier>> {
        let sql = format!(
            "SELECT {} FROM suppliers WHERE id = $1 AND {}",
            SUPPLIER_COLUMNS,
            scope_predicate(scope)
        );
        let row = sqlx::query_as::<_, SupplierRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find supplier", e))?;

        row.map(Supplier::try_from).transpose()
    }

    async fn list(
        &self,
        keyword: Option<&str>,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Supplier>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM suppliers");
        push_filters(&mut count, keyword, scope);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to count suppliers", e))?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM suppliers", SUPPLIER_COLUMNS));
        push_filters(&mut select, keyword, scope);
        select
            .push(" ORDER BY name, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<SupplierRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list suppliers", e))?;

        let suppliers = rows
            .into_iter()
            .map(Supplier::try_from)
            .collect::<RepositoryResult<Vec<_>>>()?;
        Ok((suppliers, to_total(total)))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to delete supplier", e))?;

        Ok(result.rows_affected() > 0)
    }
}
