use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{message, non_blank, MessageResponse, PageQuery};
use crate::api::errors::ApiError;
use crate::api::extract::{AppJson, AppPath, AppQuery};
use crate::api::middleware::auth::CurrentUser;
use crate::domain::catalog::{Category, CategoryDraft};
use crate::domain::pagination::{Page, RecordScope};
use crate::domain::user::Role;
use crate::state::AppState;

const DUPLICATE_NAME: &str = "A category with this name already exists";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl From<CategoryRequest> for CategoryDraft {
    fn from(req: CategoryRequest) -> Self {
        CategoryDraft {
            name: req.name,
            description: non_blank(req.description),
            image: non_blank(req.image),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
            image: c.image,
            is_deleted: c.is_deleted,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

async fn load(state: &AppState, id: Uuid, scope: RecordScope) -> Result<Category, ApiError> {
    state
        .categories
        .find_by_id(id, scope)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

async fn list_scoped(
    state: &AppState,
    query: &PageQuery,
    scope: RecordScope,
) -> Result<Page<CategoryResponse>, ApiError> {
    let page = query.page();
    let (items, total) = state
        .categories
        .list(query.keyword(), scope, &page)
        .await?;
    Ok(Page::new(items, total, &page).map(CategoryResponse::from))
}

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<CategoryResponse>>, ApiError> {
    list_scoped(&state, &query, RecordScope::Active).await.map(AppJson)
}

/// GET /api/categories/deleted/list
pub async fn list_deleted_categories(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<CategoryResponse>>, ApiError> {
    user.require(Role::Admin)?;
    list_scoped(&state, &query, RecordScope::Deleted).await.map(AppJson)
}

/// GET /api/categories/{id}
pub async fn get_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<CategoryResponse>, ApiError> {
    let category = load(&state, id, RecordScope::Active).await?;
    Ok(AppJson(category.into()))
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<CategoryRequest>,
) -> Result<(StatusCode, AppJson<CategoryResponse>), ApiError> {
    user.require(Role::Staff)?;

    let category = Category::new(req.into())?;
    state
        .categories
        .save(&category)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_NAME))?;

    tracing::info!(category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, AppJson(category.into())))
}

/// PUT /api/categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<CategoryRequest>,
) -> Result<AppJson<CategoryResponse>, ApiError> {
    user.require(Role::Staff)?;

    let mut category = load(&state, id, RecordScope::Active).await?;
    category.apply(req.into())?;
    state
        .categories
        .save(&category)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_NAME))?;

    Ok(AppJson(category.into()))
}

/// DELETE /api/categories/{id} (soft)
pub async fn delete_category(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut category = load(&state, id, RecordScope::Active).await?;
    category.soft_delete();
    state.categories.save(&category).await?;

    Ok(message("Category moved to trash"))
}

/// PUT /api/categories/{id}/restore
pub async fn restore_category(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<CategoryResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut category = load(&state, id, RecordScope::Deleted).await?;
    category.restore();
    state
        .categories
        .save(&category)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_NAME))?;

    Ok(AppJson(category.into()))
}

/// DELETE /api/categories/{id}/hard
pub async fn hard_delete_category(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let deleted = state
        .categories
        .delete(id)
        .await
        .map_err(|e| ApiError::referenced_as(e, "Category still has products"))?;
    if !deleted {
        return Err(ApiError::not_found("Category not found"));
    }

    tracing::info!(category_id = %id, "Category permanently deleted");
    Ok(message("Category permanently deleted"))
}
