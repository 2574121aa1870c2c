use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{corrupt, like_pattern, map_db_error, scope_predicate, to_total};
use crate::domain::customer::value_objects::PhoneNumber;
use crate::domain::errors::{RepositoryError, RepositoryResult};
use crate::domain::pagination::{PageRequest, RecordScope};
use crate::domain::repositories::{UserFilter, UserRepository};
use crate::domain::user::value_objects::{Email, Role};
use crate::domain::user::User;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, phone, avatar, \
                            is_active, is_deleted, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: Role,
    phone: Option<String>,
    avatar: Option<String>,
    is_active: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: r.id,
            name: r.name,
            email: Email::new(r.email).map_err(|e| corrupt("email", e))?,
            password_hash: r.password_hash,
            role: r.role,
            phone: r
                .phone
                .map(PhoneNumber::new)
                .transpose()
                .map_err(|e| corrupt("phone", e))?,
            avatar: r.avatar,
            is_active: r.is_active,
            is_deleted: r.is_deleted,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// PostgreSQL implementation of UserRepository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a new PostgresUserRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter, scope: RecordScope) {
    query.push(" WHERE ").push(scope_predicate(scope));
    if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
        let pattern = like_pattern(keyword);
        query
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(role) = filter.role {
        query.push(" AND role = ").push_bind(role);
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn save(&self, user: &User) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, role, phone, avatar,
                is_active, is_deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash,
                role = EXCLUDED.role,
                phone = EXCLUDED.phone,
                avatar = EXCLUDED.avatar,
                is_active = EXCLUDED.is_active,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.phone.as_ref().map(PhoneNumber::as_str))
        .bind(&user.avatar)
        .bind(user.is_active)
        .bind(user.is_deleted)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to save user", e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1 AND {}",
            USER_COLUMNS,
            scope_predicate(scope)
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find user by id", e))?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find user by email", e))?;

        row.map(User::try_from).transpose()
    }

    async fn list(
        &self,
        filter: &UserFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<User>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filters(&mut count, filter, scope);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to count users", e))?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        push_filters(&mut select, filter, scope);
        select
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list users", e))?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<RepositoryResult<Vec<_>>>()?;
        Ok((users, to_total(total)))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to delete user", e))?;

        Ok(result.rows_affected() > 0)
    }
}
