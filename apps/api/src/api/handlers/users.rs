use axum::extract::{Multipart, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{message, non_blank, MessageResponse, PageQuery};
use super::uploads::read_image;
use crate::api::errors::ApiError;
use crate::api::extract::{AppJson, AppPath, AppQuery};
use crate::api::middleware::auth::CurrentUser;
use crate::auth::password::{hash_password, verify_password};
use crate::domain::customer::{Customer, CustomerContact, PhoneNumber};
use crate::domain::pagination::{Page, PageRequest, RecordScope};
use crate::domain::repositories::UserFilter;
use crate::domain::user::user::validate_password;
use crate::domain::user::{Role, User};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email.into(),
            role: u.role,
            phone: u.phone.map(String::from),
            avatar: u.avatar,
            is_active: u.is_active,
            is_deleted: u.is_deleted,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub page_size: Option<u32>,
    pub page_number: Option<u32>,
    pub keyword: Option<String>,
    pub role: Option<Role>,
}

/// Fields an administrator may change on an account
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// Hashes a new password after checking the length policy
pub(crate) fn new_password_hash(state: &AppState, password: &str) -> Result<String, ApiError> {
    validate_password(password)?;
    hash_password(password, state.config.bcrypt_cost)
        .map_err(|e| ApiError::internal_server_error(format!("Failed to hash password: {}", e)))
}

/// Fails with 409 when `phone` already belongs to a different account
pub(crate) async fn ensure_phone_available(
    state: &AppState,
    user_id: Uuid,
    phone: &PhoneNumber,
) -> Result<(), ApiError> {
    let taken = state
        .customers
        .find_by_phone(phone)
        .await?
        .is_some_and(|customer| customer.is_linked_to_other(user_id));
    if taken {
        return Err(ApiError::conflict(PHONE_TAKEN));
    }
    Ok(())
}

const PHONE_TAKEN: &str = "This phone number belongs to another account";

/// Upserts the customer record for `phone` and links it to the account
///
/// A record already linked to another account is never taken over.
pub(crate) async fn link_customer(
    state: &AppState,
    user: &User,
    phone: PhoneNumber,
) -> Result<Customer, ApiError> {
    ensure_phone_available(state, user.id, &phone).await?;

    let contact = CustomerContact::new(&user.name, phone, Some(user.email.clone()), Some(user.id))?;
    let customer = state.customers.upsert_by_phone(contact).await?;
    if !customer.is_owned_by(user.id) {
        // linked by someone else between the check and the upsert
        return Err(ApiError::conflict(PHONE_TAKEN));
    }

    tracing::debug!(user_id = %user.id, customer_id = %customer.id, "Customer linked to account");
    Ok(customer)
}

async fn load(state: &AppState, id: Uuid, scope: RecordScope) -> Result<User, ApiError> {
    state
        .users
        .find_by_id(id, scope)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn list_scoped(
    state: &AppState,
    filter: &UserFilter,
    scope: RecordScope,
    page: &PageRequest,
) -> Result<Page<UserResponse>, ApiError> {
    let (items, total) = state.users.list(filter, scope, page).await?;
    Ok(Page::new(items, total, page).map(UserResponse::from))
}

fn forbid_self(admin: &CurrentUser, id: Uuid) -> Result<(), ApiError> {
    if admin.id() == id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }
    Ok(())
}

/// GET /api/users/profile
pub async fn get_profile(CurrentUser(user): CurrentUser) -> AppJson<UserResponse> {
    AppJson(user.into())
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    AppJson(req): AppJson<ProfileRequest>,
) -> Result<AppJson<UserResponse>, ApiError> {
    let phone = non_blank(req.phone).map(PhoneNumber::new).transpose()?;

    user.rename(&req.name)?;
    if let Some(phone) = phone {
        link_customer(&state, &user, phone.clone()).await?;
        user.phone = Some(phone);
    }
    user.touch();
    state.users.save(&user).await?;

    Ok(AppJson(user.into()))
}

/// PUT /api/users/profile/password
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    let valid = verify_password(&req.current_password, &user.password_hash).map_err(|e| {
        ApiError::internal_server_error(format!("Password verification failed: {}", e))
    })?;
    if !valid {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    user.password_hash = new_password_hash(&state, &req.new_password)?;
    user.touch();
    state.users.save(&user).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(message("Password updated"))
}

/// POST /api/users/profile/avatar
pub async fn upload_avatar(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    multipart: Multipart,
) -> Result<AppJson<UserResponse>, ApiError> {
    let (content_type, bytes) = read_image(multipart, "avatar").await?;
    let url = state.storage.save_image(content_type.as_deref(), &bytes).await?;

    user.avatar = Some(url);
    user.touch();
    state.users.save(&user).await?;

    Ok(AppJson(user.into()))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    admin: CurrentUser,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<AppJson<Page<UserResponse>>, ApiError> {
    admin.require(Role::Admin)?;
    let filter = UserFilter {
        keyword: non_blank(query.keyword).map(|k| k.trim().to_string()),
        role: query.role,
    };
    let page = PageRequest::new(query.page_size, query.page_number);
    list_scoped(&state, &filter, RecordScope::Active, &page).await.map(AppJson)
}

/// GET /api/users/deleted/list
pub async fn list_deleted_users(
    State(state): State<AppState>,
    admin: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<UserResponse>>, ApiError> {
    admin.require(Role::Admin)?;
    let filter = UserFilter {
        keyword: query.keyword().map(str::to_string),
        role: None,
    };
    list_scoped(&state, &filter, RecordScope::Deleted, &query.page())
        .await
        .map(AppJson)
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<UserResponse>, ApiError> {
    admin.require(Role::Admin)?;
    let user = load(&state, id, RecordScope::Active).await?;
    Ok(AppJson(user.into()))
}

/// PUT /api/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<AdminUpdateRequest>,
) -> Result<AppJson<UserResponse>, ApiError> {
    admin.require(Role::Admin)?;

    let mut user = load(&state, id, RecordScope::Active).await?;
    if let Some(name) = req.name {
        user.rename(&name)?;
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    if let Some(is_active) = req.is_active {
        user.is_active = is_active;
    }
    user.touch();
    state.users.save(&user).await?;

    tracing::info!(user_id = %id, role = %user.role, is_active = user.is_active, "User updated by admin");
    Ok(AppJson(user.into()))
}

/// DELETE /api/users/{id} (soft)
pub async fn delete_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    admin.require(Role::Admin)?;
    forbid_self(&admin, id)?;

    let mut user = load(&state, id, RecordScope::Active).await?;
    user.soft_delete();
    state.users.save(&user).await?;

    Ok(message("User moved to trash"))
}

/// PUT /api/users/{id}/restore
pub async fn restore_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<UserResponse>, ApiError> {
    admin.require(Role::Admin)?;

    let mut user = load(&state, id, RecordScope::Deleted).await?;
    user.restore();
    state.users.save(&user).await?;

    Ok(AppJson(user.into()))
}

/// DELETE /api/users/{id}/hard
pub async fn hard_delete_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    admin.require(Role::Admin)?;
    forbid_self(&admin, id)?;

    if !state.users.delete(id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id = %id, "User permanently deleted");
    Ok(message("User permanently deleted"))
}
