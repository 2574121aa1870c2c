use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, map_db_error, scope_predicate, to_total};
use crate::domain::catalog::Category;
use crate::domain::errors::RepositoryResult;
use crate::domain::pagination::{PageRequest, RecordScope};
use crate::domain::repositories::CategoryRepository;

const CATEGORY_COLUMNS: &str = "id, name, description, image, is_deleted, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    image: Option<String>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Category {
            id: r.id,
            name: r.name,
            description: r.description,
            image: r.image,
            is_deleted: r.is_deleted,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// PostgreSQL implementation of CategoryRepository
pub struct PostgresCategoryRepository {
    pool: PgPool,
}

impl PostgresCategoryRepository {
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
impl CategoryRepository for PostgresCategoryRepository {
    async fn save(&self, category: &Category) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, image, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                image = EXCLUDED.image,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.image)
        .bind(category.is_deleted)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to save category", e))?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        scope: RecordScope,
    ) -> RepositoryResult<Option<Category>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE id = $1 AND {}",
            CATEGORY_COLUMNS,
            scope_predicate(scope)
        );
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find category", e))?;

        Ok(row.map(Category::from))
    }

    async fn list(
        &self,
        keyword: Option<&str>,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Category>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM categories");
        push_filters(&mut count, keyword, scope);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to count categories", e))?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM categories", CATEGORY_COLUMNS));
        push_filters(&mut select, keyword, scope);
        select
            .push(" ORDER BY name, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<CategoryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list categories", e))?;

        Ok((rows.into_iter().map(Category::from).collect(), to_total(total)))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to delete category", e))?;

        Ok(result.rows_affected() > 0)
    }
}
