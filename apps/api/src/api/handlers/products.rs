use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{message, non_blank, MessageResponse, PageQuery};
use crate::api::errors::ApiError;
use crate::api::extract::{AppJson, AppPath, AppQuery};
use crate::api::middleware::auth::CurrentUser;
use crate::domain::catalog::{Product, ProductDraft, ProductFilter, ProductSort};
use crate::domain::pagination::{Page, PageRequest, RecordScope};
use crate::domain::user::Role;
use crate::state::AppState;

/// `?keyword=&category=&supplier=&minPrice=&maxPrice=&sort=&pageSize=&pageNumber=`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub page_size: Option<u32>,
    pub page_number: Option<u32>,
    pub keyword: Option<String>,
    pub category: Option<Uuid>,
    pub supplier: Option<Uuid>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductQuery {
    fn page(&self) -> PageRequest {
        PageRequest::new(self.page_size, self.page_number)
    }

    fn filter(&self) -> Result<ProductFilter, ApiError> {
        let price = |value: Option<f64>, field: &str| {
            value
                .map(|v| {
                    Decimal::try_from(v)
                        .map_err(|_| ApiError::bad_request(format!("Invalid {}", field)))
                })
                .transpose()
        };

        Ok(ProductFilter {
            keyword: non_blank(self.keyword.clone()).map(|k| k.trim().to_string()),
            category_id: self.category,
            supplier_id: self.supplier,
            min_price: price(self.min_price, "minPrice")?,
            max_price: price(self.max_price, "maxPrice")?,
            sort: self.sort,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub image: Option<String>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
}

impl From<ProductRequest> for ProductDraft {
    fn from(req: ProductRequest) -> Self {
        ProductDraft {
            name: req.name,
            description: non_blank(req.description),
            price: req.price,
            stock: req.stock,
            image: non_blank(req.image),
            category_id: req.category_id,
            supplier_id: req.supplier_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub image: Option<String>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub rating: f64,
    pub num_reviews: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            price: p.price,
            stock: p.stock,
            image: p.image,
            category_id: p.category_id,
            supplier_id: p.supplier_id,
            rating: p.rating,
            num_reviews: p.num_reviews,
            is_deleted: p.is_deleted,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

pub(crate) async fn load(
    state: &AppState,
    id: Uuid,
    scope: RecordScope,
) -> Result<Product, ApiError> {
    state
        .products
        .find_by_id(id, scope)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

/// Referenced category and supplier must exist and be live
async fn check_references(state: &AppState, draft: &ProductDraft) -> Result<(), ApiError> {
    if let Some(category_id) = draft.category_id {
        if state
            .categories
            .find_by_id(category_id, RecordScope::Active)
            .await?
            .is_none()
        {
            return Err(ApiError::bad_request("Category does not exist"));
        }
    }
    if let Some(supplier_id) = draft.supplier_id {
        if state
            .suppliers
            .find_by_id(supplier_id, RecordScope::Active)
            .await?
            .is_none()
        {
            return Err(ApiError::bad_request("Supplier does not exist"));
        }
    }
    Ok(())
}

async fn list_scoped(
    state: &AppState,
    query: &ProductQuery,
    scope: RecordScope,
) -> Result<Page<ProductResponse>, ApiError> {
    let page = query.page();
    let filter = query.filter()?;
    let (items, total) = state.products.list(&filter, scope, &page).await?;
    Ok(Page::new(items, total, &page).map(ProductResponse::from))
}

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ProductQuery>,
) -> Result<AppJson<Page<ProductResponse>>, ApiError> {
    list_scoped(&state, &query, RecordScope::Active).await.map(AppJson)
}

/// GET /api/products/deleted/list
pub async fn list_deleted_products(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<ProductResponse>>, ApiError> {
    user.require(Role::Admin)?;
    let query = ProductQuery {
        page_size: query.page_size,
        page_number: query.page_number,
        keyword: query.keyword,
        ..Default::default()
    };
    list_scoped(&state, &query, RecordScope::Deleted).await.map(AppJson)
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<ProductResponse>, ApiError> {
    let product = load(&state, id, RecordScope::Active).await?;
    Ok(AppJson(product.into()))
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<ProductRequest>,
) -> Result<(StatusCode, AppJson<ProductResponse>), ApiError> {
    user.require(Role::Staff)?;

    let draft: ProductDraft = req.into();
    check_references(&state, &draft).await?;
    let product = Product::new(draft)?;
    state.products.save(&product).await?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, AppJson(product.into())))
}

/// PUT /api/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<ProductRequest>,
) -> Result<AppJson<ProductResponse>, ApiError> {
    user.require(Role::Staff)?;

    let draft: ProductDraft = req.into();
    check_references(&state, &draft).await?;
    let mut product = load(&state, id, RecordScope::Active).await?;
    product.apply(draft)?;
    state.products.save(&product).await?;

    Ok(AppJson(product.into()))
}

/// DELETE /api/products/{id} (soft)
pub async fn delete_product(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    if !state.products.set_deleted(id, true).await? {
        return Err(ApiError::not_found("Product not found"));
    }

    Ok(message("Product moved to trash"))
}

/// PUT /api/products/{id}/restore
pub async fn restore_product(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<ProductResponse>, ApiError> {
    user.require(Role::Admin)?;

    if !state.products.set_deleted(id, false).await? {
        return Err(ApiError::not_found("Product not found"));
    }

    let product = load(&state, id, RecordScope::Active).await?;
    Ok(AppJson(product.into()))
}

/// DELETE /api/products/{id}/hard
pub async fn hard_delete_product(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let deleted = state
        .products
        .delete(id)
        .await
        .map_err(|e| ApiError::referenced_as(e, "Product appears on existing orders"))?;
    if !deleted {
        return Err(ApiError::not_found("Product not found"));
    }

    tracing::info!(product_id = %id, "Product permanently deleted");
    Ok(message("Product permanently deleted"))
}
