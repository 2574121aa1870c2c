use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{corrupt, map_db_error, scope_predicate, to_total};
use crate::domain::customer::{Address, Location, PhoneNumber};
use crate::domain::errors::{RepositoryError, RepositoryResult};
use crate::domain::pagination::{PageRequest, RecordScope};
use crate::domain::repositories::AddressRepository;

const ADDRESS_COLUMNS: &str = "id, customer_id, recipient_name, phone, street, \
    province_id, province_name, district_id, district_name, ward_code, ward_name, \
    is_default, is_deleted, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    customer_id: Uuid,
    recipient_name: String,
    phone: String,
    street: String,
    province_id: i32,
    province_name: String,
    district_id: i32,
    district_name: String,
    ward_code: String,
    ward_name: String,
    is_default: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AddressRow> for Address {
    type Error = RepositoryError;

    fn try_from(r: AddressRow) -> Result<Self, Self::Error> {
        Ok(Address {
            id: r.id,
            customer_id: r.customer_id,
            recipient_name: r.recipient_name,
            phone: PhoneNumber::new(&r.phone).map_err(|e| corrupt("phone", e))?,
            location: Location {
                street: r.street,
                province_id: r.province_id,
                province_name: r.province_name,
                district_id: r.district_id,
                district_name: r.district_name,
                ward_code: r.ward_code,
                ward_name: r.ward_name,
            },
            is_default: r.is_default,
            is_deleted: r.is_deleted,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// PostgreSQL implementation of AddressRepository
///
/// The single-default rule is kept by clearing sibling defaults and
/// writing the address in one transaction; the partial unique index
/// `addresses_one_default_per_customer` rejects any interleaving that
/// would still produce two defaults.
pub struct PostgresAddressRepository {
    pool: PgPool,
}

impl PostgresAddressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_page(
        &self,
        predicate: String,
        customer_id: Option<Uuid>,
        order_by: &str,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Address>, u64)> {
        let count_sql = format!("SELECT COUNT(*) FROM addresses WHERE {}", predicate);
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(customer_id) = customer_id {
            count = count.bind(customer_id);
        }
        let total = count
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to count addresses", e))?;

        let param_base = if customer_id.is_some() { 1 } else { 0 };
        let select_sql = format!(
            "SELECT {} FROM addresses WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
            ADDRESS_COLUMNS,
            predicate,
            order_by,
            param_base + 1,
            param_base + 2
        );
        let mut select = sqlx::query_as::<_, AddressRow>(&select_sql);
        if let Some(customer_id) = customer_id {
            select = select.bind(customer_id);
        }
        let rows = select
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list addresses", e))?;

        let addresses = rows
            .into_iter()
            .map(Address::try_from)
            .collect::<RepositoryResult<Vec<_>>>()?;
        Ok((addresses, to_total(total)))
    }
}

#[async_trait]
impl AddressRepository for PostgresAddressRepository {
    async fn save(&self, address: &Address) -> RepositoryResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        if address.is_default && !address.is_deleted {
            sqlx::query(
                r#"
                UPDATE addresses
                SET is_default = FALSE, updated_at = NOW()
                WHERE customer_id = $1 AND id <> $2 AND is_default = TRUE
                "#,
            )
            .bind(address.customer_id)
            .bind(address.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("Failed to clear default address", e))?;
        }

        let location = &address.location;
        sqlx::query(
            r#"
            INSERT INTO addresses (
                id, customer_id, recipient_name, phone, street,
                province_id, province_name, district_id, district_name, ward_code, ward_name,
                is_default, is_deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                recipient_name = EXCLUDED.recipient_name,
                phone = EXCLUDED.phone,
                street = EXCLUDED.street,
                province_id = EXCLUDED.province_id,
                province_name = EXCLUDED.province_name,
                district_id = EXCLUDED.district_id,
                district_name = EXCLUDED.district_name,
                ward_code = EXCLUDED.ward_code,
                ward_name = EXCLUDED.ward_name,
                is_default = EXCLUDED.is_default,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(address.id)
        .bind(address.customer_id)
        .bind(&address.recipient_name)
        .bind(address.phone.as_str())
        .bind(&location.street)
        .bind(location.province_id)
        .bind(&location.province_name)
        .bind(location.district_id)
        .bind(&location.district_name)
        .bind(&location.ward_code)
        .bind(&location.ward_name)
        .bind(address.is_default)
        .bind(address.is_deleted)
        .bind(address.created_at)
        .bind(address.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error("Failed to save address", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit address", e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Address>> {
        let sql = format!(
            "SELECT {} FROM addresses WHERE id = $1 AND {}",
            ADDRESS_COLUMNS,
            scope_predicate(scope)
        );
        let row = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find address", e))?;

        row.map(Address::try_from).transpose()
    }

    async fn list_by_customer(
        &self,
        customer_id: Uuid,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Address>, u64)> {
        self.fetch_page(
            format!("customer_id = $1 AND {}", scope_predicate(scope)),
            Some(customer_id),
            "is_default DESC, created_at DESC, id",
            page,
        )
        .await
    }

    async fn list(
        &self,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Address>, u64)> {
        self.fetch_page(
            scope_predicate(scope).to_string(),
            None,
            "updated_at DESC, id",
            page,
        )
        .await
    }

    async fn count_live(&self, customer_id: Uuid) -> RepositoryResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM addresses WHERE customer_id = $1 AND is_deleted = FALSE",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to count addresses", e))?;

        Ok(to_total(count))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to delete address", e))?;

        Ok(result.rows_affected() > 0)
    }
}
