use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{map_db_error, scope_predicate, to_total};
use crate::domain::errors::RepositoryResult;
use crate::domain::pagination::{PageRequest, RecordScope};
use crate::domain::repositories::{ReviewFilter, ReviewRepository};
use crate::domain::review::Review;

const REVIEW_COLUMNS: &str =
    "id, product_id, user_id, user_name, rating, comment, is_deleted, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    product_id: Uuid,
    user_id: Uuid,
    user_name: String,
    rating: i16,
    comment: Option<String>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(r: ReviewRow) -> Self {
        Review {
            id: r.id,
            product_id: r.product_id,
            user_id: r.user_id,
            user_name: r.user_name,
            rating: r.rating,
            comment: r.comment,
            is_deleted: r.is_deleted,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// PostgreSQL implementation of ReviewRepository
pub struct PostgresReviewRepository {
    pool: PgPool,
}

impl PostgresReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ReviewFilter, scope: RecordScope) {
    query.push(" WHERE ").push(scope_predicate(scope));
    if let Some(product_id) = filter.product_id {
        query.push(" AND product_id = ").push_bind(product_id);
    }
    if let Some(user_id) = filter.user_id {
        query.push(" AND user_id = ").push_bind(user_id);
    }
}

#[async_trait]
impl ReviewRepository for PostgresReviewRepository {
    async fn save(&self, review: &Review) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (id, product_id, user_id, user_name, rating, comment,
                                 is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                user_name = EXCLUDED.user_name,
                rating = EXCLUDED.rating,
                comment = EXCLUDED.comment,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(review.id)
        .bind(review.product_id)
        .bind(review.user_id)
        .bind(&review.user_name)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.is_deleted)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to save review", e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Review>> {
        let sql = format!(
            "SELECT {} FROM reviews WHERE id = $1 AND {}",
            REVIEW_COLUMNS,
            scope_predicate(scope)
        );
        let row = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find review", e))?;

        Ok(row.map(Review::from))
    }

    async fn list(
        &self,
        filter: &ReviewFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Review>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM reviews");
        push_filters(&mut count, filter, scope);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to count reviews", e))?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM reviews", REVIEW_COLUMNS));
        push_filters(&mut select, filter, scope);
        select
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<ReviewRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list reviews", e))?;

        Ok((rows.into_iter().map(Review::from).collect(), to_total(total)))
    }

    async fn live_ratings(&self, product_id: Uuid) -> RepositoryResult<Vec<i16>> {
        sqlx::query_scalar::<_, i16>(
            "SELECT rating FROM reviews WHERE product_id = $1 AND is_deleted = FALSE",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to load ratings", e))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to delete review", e))?;

        Ok(result.rows_affected() > 0)
    }
}
