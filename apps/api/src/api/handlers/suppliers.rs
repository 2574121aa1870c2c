use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{message, non_blank, MessageResponse, PageQuery};
use crate::api::errors::ApiError;
use crate::api::extract::{AppJson, AppPath, AppQuery};
use crate::api::middleware::auth::CurrentUser;
use crate::domain::catalog::{Supplier, SupplierDraft};
use crate::domain::pagination::{Page, RecordScope};
use crate::domain::user::Role;
use crate::state::AppState;

const DUPLICATE_NAME: &str = "A supplier with this name already exists";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl From<SupplierRequest> for SupplierDraft {
    fn from(req: SupplierRequest) -> Self {
        SupplierDraft {
            name: req.name,
            email: non_blank(req.email),
            phone: non_blank(req.phone),
            address: non_blank(req.address),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Supplier> for SupplierResponse {
    fn from(s: Supplier) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email.map(String::from),
            phone: s.phone.map(String::from),
            address: s.address,
            is_deleted: s.is_deleted,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

async fn load(state: &AppState, id: Uuid, scope: RecordScope) -> Result<Supplier, ApiError> {
    state
        .suppliers
        .find_by_id(id, scope)
        .await?
        .ok_or_else(|| ApiError::not_found("Supplier not found"))
}

async fn list_scoped(
    state: &AppState,
    query: &PageQuery,
    scope: RecordScope,
) -> Result<Page<SupplierResponse>, ApiError> {
    let page = query.page();
    let (items, total) = state.suppliers.list(query.keyword(), scope, &page).await?;
    Ok(Page::new(items, total, &page).map(SupplierResponse::from))
}

/// GET /api/suppliers
pub async fn list_suppliers(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<SupplierResponse>>, ApiError> {
    user.require(Role::Staff)?;
    list_scoped(&state, &query, RecordScope::Active).await.map(AppJson)
}

/// GET /api/suppliers/deleted/list
pub async fn list_deleted_suppliers(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<SupplierResponse>>, ApiError> {
    user.require(Role::Admin)?;
    list_scoped(&state, &query, RecordScope::Deleted).await.map(AppJson)
}

/// GET /api/suppliers/{id}
pub async fn get_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<SupplierResponse>, ApiError> {
    user.require(Role::Staff)?;
    let supplier = load(&state, id, RecordScope::Active).await?;
    Ok(AppJson(supplier.into()))
}

/// POST /api/suppliers
pub async fn create_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<SupplierRequest>,
) -> Result<(StatusCode, AppJson<SupplierResponse>), ApiError> {
    user.require(Role::Staff)?;

    let supplier = Supplier::new(req.into())?;
    state
        .suppliers
        .save(&supplier)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_NAME))?;

    tracing::info!(supplier_id = %supplier.id, "Supplier created");
    Ok((StatusCode::CREATED, AppJson(supplier.into())))
}

/// PUT /api/suppliers/{id}
pub async fn update_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<SupplierRequest>,
) -> Result<AppJson<SupplierResponse>, ApiError> {
    user.require(Role::Staff)?;

    let mut supplier = load(&state, id, RecordScope::Active).await?;
    supplier.apply(req.into())?;
    state
        .suppliers
        .save(&supplier)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_NAME))?;

    Ok(AppJson(supplier.into()))
}

/// DELETE /api/suppliers/{id} (soft)
pub async fn delete_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut supplier = load(&state, id, RecordScope::Active).await?;
    supplier.soft_delete();
    state.suppliers.save(&supplier).await?;

    Ok(message("Supplier moved to trash"))
}

/// PUT /api/suppliers/{id}/restore
pub async fn restore_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<SupplierResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut supplier = load(&state, id, RecordScope::Deleted).await?;
    supplier.restore();
    state
        .suppliers
        .save(&supplier)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_NAME))?;

    Ok(AppJson(supplier.into()))
}

/// DELETE /api/suppliers/{id}/hard
pub async fn hard_delete_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let deleted = state
        .suppliers
        .delete(id)
        .await
        .map_err(|e| ApiError::referenced_as(e, "Supplier still has products"))?;
    if !deleted {
        return Err(ApiError::not_found("Supplier not found"));
    }

    tracing::info!(supplier_id = %id, "Supplier permanently deleted");
    Ok(message("Supplier permanently deleted"))
}
