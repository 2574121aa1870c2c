use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use super::common::{message, non_blank, notify_in_background, MessageResponse};
use super::users::{ensure_phone_available, link_customer, new_password_hash, UserResponse};
use crate::api::errors::ApiError;
use crate::api::extract::AppJson;
use crate::auth::jwt::{create_reset_token, create_token, verify_token, TokenPurpose};
use crate::auth::password::verify_password;
use crate::domain::customer::PhoneNumber;
use crate::domain::pagination::RecordScope;
use crate::domain::user::{Email, User};
use crate::infrastructure::email::password_reset_email;
use crate::state::AppState;

/// Request body for user registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Response from successful registration or login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

fn issue_token(state: &AppState, user: &User) -> Result<String, ApiError> {
    create_token(
        user.id,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiry_hours,
    )
    .map_err(|e| ApiError::internal_server_error(format!("Failed to create token: {}", e)))
}

/// Register a new customer account
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, AppJson<AuthResponse>), ApiError> {
    let email = Email::new(&req.email)?;
    let phone = non_blank(req.phone).map(PhoneNumber::new).transpose()?;
    let password_hash = new_password_hash(&state, &req.password)?;

    let user = User::register(&req.name, email, password_hash, phone.clone())?;
    if let Some(phone) = &phone {
        ensure_phone_available(&state, user.id, phone).await?;
    }
    state
        .users
        .save(&user)
        .await
        .map_err(|e| ApiError::duplicate_as(e, "Email already registered"))?;

    if let Some(phone) = phone {
        link_customer(&state, &user, phone).await?;
    }

    tracing::info!(user_id = %user.id, "User registered");
    let token = issue_token(&state, &user)?;
    Ok((
        StatusCode::CREATED,
        AppJson(AuthResponse {
            user: user.into(),
            token,
        }),
    ))
}

/// Login with email and password
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<AppJson<AuthResponse>, ApiError> {
    let email = Email::new(&req.email)?;

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        ApiError::internal_server_error(format!("Password verification failed: {}", e))
    })?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if !user.can_sign_in() {
        return Err(ApiError::unauthorized("Account is disabled"));
    }

    let token = issue_token(&state, &user)?;
    Ok(AppJson(AuthResponse {
        user: user.into(),
        token,
    }))
}

/// Emails a reset link when the account exists; the answer is the same either way
///
/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    let email = Email::new(&req.email)?;

    if let Some(user) = state
        .users
        .find_by_email(&email)
        .await?
        .filter(User::can_sign_in)
    {
        let secret = &state.config.jwt_secret;
        let token = create_reset_token(user.id, user.role, &user.password_hash, secret)
            .map_err(|e| ApiError::internal_server_error(format!("Failed to create token: {}", e)))?;
        let link = format!(
            "{}/reset-password?token={}",
            state.config.frontend_url.trim_end_matches('/'),
            token
        );
        notify_in_background(&state, password_reset_email(user.email.as_str(), &user.name, &link));
        tracing::info!(user_id = %user.id, "Password reset requested");
    }

    Ok(message(
        "If an account exists for this email, a reset link has been sent",
    ))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    let claims = verify_token(&req.token, &state.config.jwt_secret, TokenPurpose::PasswordReset)
        .map_err(|_| ApiError::bad_request("Invalid or expired reset token"))?;

    let mut user = state
        .users
        .find_by_id(claims.sub, RecordScope::Active)
        .await?
        .filter(|user| claims.matches_password(&user.password_hash))
        .ok_or_else(|| ApiError::bad_request("Invalid or expired reset token"))?;

    user.password_hash = new_password_hash(&state, &req.password)?;
    user.touch();
    state.users.save(&user).await?;

    tracing::info!(user_id = %user.id, "Password reset");
    Ok(message("Password has been reset"))
}

/// Health check endpoint
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}
