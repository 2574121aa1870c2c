use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{corrupt, like_pattern, map_db_error, scope_predicate, to_total};
use crate::domain::customer::{Customer, CustomerContact, PhoneNumber};
use crate::domain::errors::{RepositoryError, RepositoryResult};
use crate::domain::pagination::{PageRequest, RecordScope};
use crate::domain::repositories::CustomerRepository;
use crate::domain::user::value_objects::Email;

const CUSTOMER_COLUMNS: &str =
    "id, name, phone, email, user_id, is_deleted, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    phone: String,
    email: Option<String>,
    user_id: Option<Uuid>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(r: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            id: r.id,
            name: r.name,
            phone: PhoneNumber::new(&r.phone).map_err(|e| corrupt("phone", e))?,
            email: r
                .email
                .map(Email::new)
                .transpose()
                .map_err(|e| corrupt("email", e))?,
            user_id: r.user_id,
            is_deleted: r.is_deleted,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// PostgreSQL implementation of CustomerRepository
pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, keyword: Option<&str>, scope: RecordScope) {
    query.push(" WHERE ").push(scope_predicate(scope));
    if let Some(keyword) = keyword.filter(|k| !k.trim().is_empty()) {
        let pattern = like_pattern(keyword);
        query
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn save(&self, customer: &Customer) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, email, user_id, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                user_id = EXCLUDED.user_id,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(customer.phone.as_str())
        .bind(customer.email.as_ref().map(Email::as_str))
        .bind(customer.user_id)
        .bind(customer.is_deleted)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to save customer", e))?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        scope: RecordScope,
    ) -> RepositoryResult<Option<Customer>> {
        let sql = format!(
            "SELECT {} FROM customers WHERE id = $1 AND {}",
            CUSTOMER_COLUMNS,
            scope_predicate(scope)
        );
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find customer", e))?;

        row.map(Customer::try_from).transpose()
    }

    async fn find_by_phone(&self, phone: &PhoneNumber) -> RepositoryResult<Option<Customer>> {
        let sql = format!("SELECT {} FROM customers WHERE phone = $1", CUSTOMER_COLUMNS);
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(phone.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find customer by phone", e))?;

        row.map(Customer::try_from).transpose()
    }

    async fn find_by_user(&self, user_id: Uuid) -> RepositoryResult<Option<Customer>> {
        let sql = format!(
            "SELECT {} FROM customers WHERE user_id = $1 AND is_deleted = FALSE \
             ORDER BY updated_at DESC LIMIT 1",
            CUSTOMER_COLUMNS
        );
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find customer by user", e))?;

        row.map(Customer::try_from).transpose()
    }

    async fn upsert_by_phone(&self, contact: CustomerContact) -> RepositoryResult<Customer> {
        // Same merge rules as Customer::merge_contact, in one statement so
        // concurrent checkouts with the same phone cannot race
        let sql = format!(
            r#"
            INSERT INTO customers (id, name, phone, email, user_id, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, NOW(), NOW())
            ON CONFLICT (phone) DO UPDATE SET
                name = CASE WHEN {owner} THEN EXCLUDED.name ELSE customers.name END,
                email = CASE WHEN {owner}
                    THEN COALESCE(EXCLUDED.email, customers.email)
                    ELSE customers.email END,
                user_id = COALESCE(customers.user_id, EXCLUDED.user_id),
                is_deleted = FALSE,
                updated_at = NOW()
            RETURNING {columns}
            "#,
            owner = "customers.user_id IS NULL OR customers.user_id = EXCLUDED.user_id",
            columns = CUSTOMER_COLUMNS
        );
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&contact.name)
            .bind(contact.phone.as_str())
            .bind(contact.email.as_ref().map(Email::as_str))
            .bind(contact.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to upsert customer", e))?;

        Customer::try_from(row)
    }

    async fn list(
        &self,
        keyword: Option<&str>,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Customer>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customers");
        push_filters(&mut count, keyword, scope);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to count customers", e))?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM customers", CUSTOMER_COLUMNS));
        push_filters(&mut select, keyword, scope);
        select
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<CustomerRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list customers", e))?;

        let customers = rows
            .into_iter()
            .map(Customer::try_from)
            .collect::<RepositoryResult<Vec<_>>>()?;
        Ok((customers, to_total(total)))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to delete customer", e))?;

        Ok(result.rows_affected() > 0)
    }
}
