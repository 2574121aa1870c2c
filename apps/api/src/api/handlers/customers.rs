use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{message, non_blank, MessageResponse, PageQuery};
use crate::api::errors::ApiError;
use crate::api::extract::{AppJson, AppPath, AppQuery};
use crate::api::middleware::auth::CurrentUser;
use crate::domain::customer::{Customer, CustomerContact, PhoneNumber};
use crate::domain::pagination::{Page, RecordScope};
use crate::domain::user::{Email, Role};
use crate::state::AppState;

const DUPLICATE_PHONE: &str = "A customer with this phone number already exists";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl CustomerRequest {
    fn parts(&self) -> Result<(PhoneNumber, Option<Email>), ApiError> {
        let phone = PhoneNumber::new(&self.phone)?;
        let email = non_blank(self.email.clone()).map(Email::new).transpose()?;
        Ok((phone, email))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub user_id: Option<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Customer> for CustomerResponse {
    fn from(c: Customer) -> Self {
        Self {
            id: c.id,
            name: c.name,
            phone: c.phone.into(),
            email: c.email.map(String::from),
            user_id: c.user_id,
            is_deleted: c.is_deleted,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

pub(crate) async fn load(
    state: &AppState,
    id: Uuid,
    scope: RecordScope,
) -> Result<Customer, ApiError> {
    state
        .customers
        .find_by_id(id, scope)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer not found"))
}

async fn list_scoped(
    state: &AppState,
    query: &PageQuery,
    scope: RecordScope,
) -> Result<Page<CustomerResponse>, ApiError> {
    let page = query.page();
    let (items, total) = state.customers.list(query.keyword(), scope, &page).await?;
    Ok(Page::new(items, total, &page).map(CustomerResponse::from))
}

/// GET /api/customers
pub async fn list_customers(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<CustomerResponse>>, ApiError> {
    user.require(Role::Staff)?;
    list_scoped(&state, &query, RecordScope::Active).await.map(AppJson)
}

/// GET /api/customers/deleted/list
pub async fn list_deleted_customers(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<CustomerResponse>>, ApiError> {
    user.require(Role::Admin)?;
    list_scoped(&state, &query, RecordScope::Deleted).await.map(AppJson)
}

/// GET /api/customers/{id}
pub async fn get_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<CustomerResponse>, ApiError> {
    user.require(Role::Staff)?;
    let customer = load(&state, id, RecordScope::Active).await?;
    Ok(AppJson(customer.into()))
}

/// GET /api/customers/phone/{phone}
pub async fn get_customer_by_phone(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(phone): AppPath<String>,
) -> Result<AppJson<CustomerResponse>, ApiError> {
    user.require(Role::Staff)?;

    let phone = PhoneNumber::new(&phone)?;
    let customer = state
        .customers
        .find_by_phone(&phone)
        .await?
        .filter(|c| !c.is_deleted)
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;

    Ok(AppJson(customer.into()))
}

/// POST /api/customers
pub async fn create_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<CustomerRequest>,
) -> Result<(StatusCode, AppJson<CustomerResponse>), ApiError> {
    user.require(Role::Staff)?;

    let (phone, email) = req.parts()?;
    let customer = Customer::new(CustomerContact::new(&req.name, phone, email, None)?);
    state
        .customers
        .save(&customer)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_PHONE))?;

    tracing::info!(customer_id = %customer.id, "Customer created");
    Ok((StatusCode::CREATED, AppJson(customer.into())))
}

/// PUT /api/customers/{id}
pub async fn update_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<CustomerRequest>,
) -> Result<AppJson<CustomerResponse>, ApiError> {
    user.require(Role::Staff)?;

    let (phone, email) = req.parts()?;
    let mut customer = load(&state, id, RecordScope::Active).await?;
    customer.update(&req.name, phone, email)?;
    state
        .customers
        .save(&customer)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_PHONE))?;

    Ok(AppJson(customer.into()))
}

/// DELETE /api/customers/{id} (soft)
pub async fn delete_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut customer = load(&state, id, RecordScope::Active).await?;
    customer.soft_delete();
    state.customers.save(&customer).await?;

    Ok(message("Customer moved to trash"))
}

/// PUT /api/customers/{id}/restore
pub async fn restore_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<CustomerResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut customer = load(&state, id, RecordScope::Deleted).await?;
    customer.restore();
    state
        .customers
        .save(&customer)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_PHONE))?;

    Ok(AppJson(customer.into()))
}

/// DELETE /api/customers/{id}/hard
pub async fn hard_delete_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let deleted = state
        .customers
        .delete(id)
        .await
        .map_err(|e| ApiError::referenced_as(e, "Customer still has orders"))?;
    if !deleted {
        return Err(ApiError::not_found("Customer not found"));
    }

    tracing::info!(customer_id = %id, "Customer permanently deleted");
    Ok(message("Customer permanently deleted"))
}
