use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::auth::jwt::{verify_token, TokenPurpose};
use crate::domain::pagination::RecordScope;
use crate::domain::user::{Role, User};
use crate::state::AppState;

/// The signed-in user, loaded fresh from the store
///
/// Rejects with 401 when the Authorization header is missing or invalid, or
/// when the account was deleted or deactivated after the token was issued.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     // user.id, user.role ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    /// Fails with 403 unless the user's role satisfies `role`
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        require_role(&self.0, role)
    }

    pub fn is_staff(&self) -> bool {
        self.0.role.is_staff()
    }
}

/// The signed-in user when a token is present; guests get `None`
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

pub fn require_role(user: &User, role: Role) -> Result<(), ApiError> {
    if user.role.satisfies(role) {
        Ok(())
    } else {
        Err(ApiError::forbidden("You do not have permission to perform this action"))
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(auth_header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_header = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid authorization header"))?;

    // Extract bearer token
    auth_header
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization format. Use: Bearer <token>"))
}

async fn load_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = verify_token(token, &state.config.jwt_secret, TokenPurpose::Access)
        .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))?;

    let user = state
        .users
        .find_by_id(claims.sub, RecordScope::Active)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    if !user.can_sign_in() {
        return Err(ApiError::unauthorized("Account is disabled"));
    }
    Ok(user)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(parts)?
            .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

        load_user(&state, token).await.map(CurrentUser)
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        match bearer_token(parts)? {
            Some(token) => load_user(&state, token).await.map(|u| MaybeUser(Some(u))),
            None => Ok(MaybeUser(None)),
        }
    }
}
