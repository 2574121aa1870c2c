use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{message, MessageResponse, PageQuery};
use super::customers;
use super::users::link_customer;
use crate::api::errors::ApiError;
use crate::api::extract::{AppJson, AppPath, AppQuery};
use crate::api::middleware::auth::CurrentUser;
use crate::domain::customer::{Address, Customer, Location, PhoneNumber};
use crate::domain::pagination::{Page, PageRequest, RecordScope};
use crate::domain::user::Role;
use crate::infrastructure::shipping::resolve_location;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressListQuery {
    pub customer_id: Option<Uuid>,
    pub page_size: Option<u32>,
    pub page_number: Option<u32>,
}

/// Location part of an address form
///
/// Names are only read when GHN is not configured; otherwise they are
/// filled from GHN master data.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInput {
    pub street: String,
    pub province_id: i32,
    #[serde(default)]
    pub province_name: String,
    pub district_id: i32,
    #[serde(default)]
    pub district_name: String,
    pub ward_code: String,
    #[serde(default)]
    pub ward_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    /// Defaults to the caller's own customer record
    pub customer_id: Option<Uuid>,
    pub recipient_name: String,
    pub phone: String,
    #[serde(flatten)]
    pub location: LocationInput,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub province_id: i32,
    pub province_name: String,
    pub district_id: i32,
    pub district_name: String,
    pub ward_code: String,
    pub ward_name: String,
    pub full_address: String,
    pub is_default: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Address> for AddressResponse {
    fn from(a: Address) -> Self {
        let full_address = a.location.full_text();
        let Location {
            street,
            province_id,
            province_name,
            district_id,
            district_name,
            ward_code,
            ward_name,
        } = a.location;
        Self {
            id: a.id,
            customer_id: a.customer_id,
            recipient_name: a.recipient_name,
            phone: a.phone.into(),
            street,
            province_id,
            province_name,
            district_id,
            district_name,
            ward_code,
            ward_name,
            full_address,
            is_default: a.is_default,
            is_deleted: a.is_deleted,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

/// Builds a location, checked against GHN when it is configured
pub(crate) async fn build_location(
    state: &AppState,
    input: &LocationInput,
) -> Result<Location, ApiError> {
    match &state.shipping {
        Some(provider) => Ok(resolve_location(
            provider.as_ref(),
            &input.street,
            input.province_id,
            input.district_id,
            &input.ward_code,
        )
        .await?),
        None => Ok(Location::new(
            &input.street,
            (input.province_id, &input.province_name),
            (input.district_id, &input.district_name),
            (&input.ward_code, &input.ward_name),
        )?),
    }
}

/// Staff manage every customer's addresses; others only their own
async fn authorize(state: &AppState, user: &CurrentUser, customer_id: Uuid) -> Result<(), ApiError> {
    if user.is_staff() {
        return Ok(());
    }
    let owned = state
        .customers
        .find_by_id(customer_id, RecordScope::Any)
        .await?
        .is_some_and(|c| c.is_owned_by(user.id()));
    if owned {
        Ok(())
    } else {
        Err(ApiError::forbidden("You cannot manage this customer's addresses"))
    }
}

async fn load_owned(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
    scope: RecordScope,
) -> Result<Address, ApiError> {
    let address = state
        .addresses
        .find_by_id(id, scope)
        .await?
        .ok_or_else(|| ApiError::not_found("Address not found"))?;
    authorize(state, user, address.customer_id).await?;
    Ok(address)
}

/// The caller's customer record, created from the address contact if missing
async fn own_customer(
    state: &AppState,
    user: &CurrentUser,
    phone: &PhoneNumber,
) -> Result<Customer, ApiError> {
    if let Some(customer) = state.customers.find_by_user(user.id()).await? {
        return Ok(customer);
    }
    let account = &user.0;
    let phone = account.phone.clone().unwrap_or_else(|| phone.clone());
    link_customer(state, account, phone).await
}

/// GET /api/addresses?customerId=
pub async fn list_addresses(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<AddressListQuery>,
) -> Result<AppJson<Page<AddressResponse>>, ApiError> {
    let customer_id = query
        .customer_id
        .ok_or_else(|| ApiError::bad_request("customerId is required"))?;
    authorize(&state, &user, customer_id).await?;

    let page = PageRequest::new(query.page_size, query.page_number);
    let (items, total) = state
        .addresses
        .list_by_customer(customer_id, RecordScope::Active, &page)
        .await?;
    Ok(AppJson(Page::new(items, total, &page).map(AddressResponse::from)))
}

/// GET /api/addresses/mine
pub async fn list_my_addresses(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<AddressResponse>>, ApiError> {
    let page = query.page();
    let Some(customer) = state.customers.find_by_user(user.id()).await? else {
        return Ok(AppJson(Page::new(Vec::new(), 0, &page)));
    };

    let (items, total) = state
        .addresses
        .list_by_customer(customer.id, RecordScope::Active, &page)
        .await?;
    Ok(AppJson(Page::new(items, total, &page).map(AddressResponse::from)))
}

/// GET /api/addresses/deleted/list
pub async fn list_deleted_addresses(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<AddressResponse>>, ApiError> {
    user.require(Role::Admin)?;
    let page = query.page();
    let (items, total) = state.addresses.list(RecordScope::Deleted, &page).await?;
    Ok(AppJson(Page::new(items, total, &page).map(AddressResponse::from)))
}

/// GET /api/addresses/{id}
pub async fn get_address(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<AddressResponse>, ApiError> {
    let address = load_owned(&state, &user, id, RecordScope::Active).await?;
    Ok(AppJson(address.into()))
}

/// POST /api/addresses
pub async fn create_address(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<AddressRequest>,
) -> Result<(StatusCode, AppJson<AddressResponse>), ApiError> {
    let phone = PhoneNumber::new(&req.phone)?;
    let customer_id = match req.customer_id {
        Some(customer_id) => {
            authorize(&state, &user, customer_id).await?;
            customers::load(&state, customer_id, RecordScope::Active)
                .await?
                .id
        }
        None => own_customer(&state, &user, &phone).await?.id,
    };

    let location = build_location(&state, &req.location).await?;
    let first = state.addresses.count_live(customer_id).await? == 0;
    let address = Address::new(
        customer_id,
        &req.recipient_name,
        phone,
        location,
        first || req.is_default,
    )?;
    state.addresses.save(&address).await?;

    tracing::info!(address_id = %address.id, customer_id = %customer_id, "Address created");
    Ok((StatusCode::CREATED, AppJson(address.into())))
}

/// PUT /api/addresses/{id}
pub async fn update_address(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<AddressRequest>,
) -> Result<AppJson<AddressResponse>, ApiError> {
    let mut address = load_owned(&state, &user, id, RecordScope::Active).await?;

    let phone = PhoneNumber::new(&req.phone)?;
    let location = build_location(&state, &req.location).await?;
    address.update(&req.recipient_name, phone, location)?;
    if req.is_default {
        address.mark_default();
    }
    state.addresses.save(&address).await?;

    Ok(AppJson(address.into()))
}

/// PUT /api/addresses/{id}/default
pub async fn set_default_address(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<AddressResponse>, ApiError> {
    let mut address = load_owned(&state, &user, id, RecordScope::Active).await?;
    address.mark_default();
    state.addresses.save(&address).await?;
    Ok(AppJson(address.into()))
}

/// DELETE /api/addresses/{id} (soft)
pub async fn delete_address(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    let mut address = load_owned(&state, &user, id, RecordScope::Active).await?;
    address.soft_delete();
    state.addresses.save(&address).await?;
    Ok(message("Address moved to trash"))
}

/// PUT /api/addresses/{id}/restore
pub async fn restore_address(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<AddressResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut address = state
        .addresses
        .find_by_id(id, RecordScope::Deleted)
        .await?
        .ok_or_else(|| ApiError::not_found("Address not found"))?;
    address.restore();
    state.addresses.save(&address).await?;

    Ok(AppJson(address.into()))
}

/// DELETE /api/addresses/{id}/hard
pub async fn hard_delete_address(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    if !state.addresses.delete(id).await? {
        return Err(ApiError::not_found("Address not found"));
    }
    Ok(message("Address permanently deleted"))
}
