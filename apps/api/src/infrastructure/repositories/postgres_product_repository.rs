use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, map_db_error, scope_predicate, to_total};
use crate::domain::catalog::{Product, ProductFilter, ProductSort, RatingSummary};
use crate::domain::errors::RepositoryResult;
use crate::domain::pagination::{PageRequest, RecordScope};
use crate::domain::repositories::ProductRepository;

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, image, \
    category_id, supplier_id, rating, num_reviews, is_deleted, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
    image: Option<String>,
    category_id: Option<Uuid>,
    supplier_id: Option<Uuid>,
    rating: f64,
    num_reviews: i32,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product {
            id: r.id,
            name: r.name,
            description: r.description,
            price: r.price,
            stock: r.stock,
            image: r.image,
            category_id: r.category_id,
            supplier_id: r.supplier_id,
            rating: r.rating,
            num_reviews: r.num_reviews,
            is_deleted: r.is_deleted,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// PostgreSQL implementation of ProductRepository
pub struct PostgresProductRepository {
    pool: PgPool,
}

impl PostgresProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    filter: &ProductFilter,
    scope: RecordScope,
) {
    query.push(" WHERE ").push(scope_predicate(scope));
    if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
        query.push(" AND name ILIKE ").push_bind(like_pattern(keyword));
    }
    if let Some(category_id) = filter.category_id {
        query.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(supplier_id) = filter.supplier_id {
        query.push(" AND supplier_id = ").push_bind(supplier_id);
    }
    if let Some(min) = filter.min_price {
        query.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query.push(" AND price <= ").push_bind(max);
    }
}

fn order_clause(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Newest => " ORDER BY created_at DESC, id",
        ProductSort::PriceAsc => " ORDER BY price ASC, id",
        ProductSort::PriceDesc => " ORDER BY price DESC, id",
        ProductSort::Rating => " ORDER BY rating DESC, num_reviews DESC, id",
    }
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn save(&self, product: &Product) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price, stock, image, category_id, supplier_id,
                rating, num_reviews, is_deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                image = EXCLUDED.image,
                category_id = EXCLUDED.category_id,
                supplier_id = EXCLUDED.supplier_id,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.image)
        .bind(product.category_id)
        .bind(product.supplier_id)
        .bind(product.rating)
        .bind(product.num_reviews)
        .bind(product.is_deleted)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to save product", e))?;

        Ok(())
    }

    async fn set_rating(&self, id: Uuid, summary: RatingSummary) -> RepositoryResult<()> {
        sqlx::query(
            "UPDATE products SET rating = $2, num_reviews = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(summary.average)
        .bind(summary.count)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to update product rating", e))?;

        Ok(())
    }

    async fn set_deleted(&self, id: Uuid, deleted: bool) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET is_deleted = $2, updated_at = NOW() \
             WHERE id = $1 AND is_deleted <> $2",
        )
        .bind(id)
        .bind(deleted)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to update product", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE id = $1 AND {}",
            PRODUCT_COLUMNS,
            scope_predicate(scope)
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find product", e))?;

        Ok(row.map(Product::from))
    }

    async fn find_many(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE id = ANY($1) AND is_deleted = FALSE",
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to load products", e))?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list(
        &self,
        filter: &ProductFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Product>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut count, filter, scope);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to count products", e))?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        push_filters(&mut select, filter, scope);
        select
            .push(order_clause(filter.sort))
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list products", e))?;

        Ok((rows.into_iter().map(Product::from).collect(), to_total(total)))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to delete product", e))?;

        Ok(result.rows_affected() > 0)
    }
}
