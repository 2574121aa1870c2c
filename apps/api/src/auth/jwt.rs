// JWT token creation and verification
// Access tokens carry the user's role; reset tokens only prove email ownership
// and stop working once the password they were issued against changes

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::user::Role;

/// Lifetime of a password reset token
pub const RESET_TOKEN_MINUTES: i64 = 15;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    PasswordReset,
}

/// JWT claims structure
///
/// # Fields
/// * `sub` - Subject (user_id)
/// * `role` - Role at the time of issue
/// * `purpose` - Access or password reset
/// * `exp` - Expiry time (seconds since epoch)
/// * `pwd` - Reset tokens only: fingerprint of the password hash at issue
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub purpose: TokenPurpose,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwd: Option<String>,
}

impl Claims {
    /// True when the token was issued against `password_hash`
    pub fn matches_password(&self, password_hash: &str) -> bool {
        self.pwd.as_deref() == Some(password_fingerprint(password_hash).as_str())
    }
}

/// Short digest of a password hash; every new hash has a fresh salt
fn password_fingerprint(password_hash: &str) -> String {
    let digest = Sha256::digest(password_hash.as_bytes());
    hex::encode(&digest[..12])
}

/// Creates an access token for a user
///
/// # Token Properties
/// - Expires after `expiry_hours`
/// - Signed with HS256 algorithm
/// - Contains user_id in 'sub' claim
///
/// # Example
/// ```
/// use online_store_api::auth::jwt::create_token;
/// use online_store_api::domain::user::Role;
/// use uuid::Uuid;
///
/// let token = create_token(Uuid::new_v4(), Role::Customer, "your-secret-key", 24)
///     .expect("valid token");
/// ```
pub fn create_token(
    user_id: Uuid,
    role: Role,
    secret: &str,
    expiry_hours: i64,
) -> Result<String, String> {
    sign(
        Claims {
            sub: user_id,
            role,
            purpose: TokenPurpose::Access,
            exp: expiry(Duration::hours(expiry_hours)),
            pwd: None,
        },
        secret,
    )
}

/// Creates a short-lived token that authorises one password reset
///
/// The token is bound to `password_hash`, so it is spent as soon as the
/// password changes.
pub fn create_reset_token(
    user_id: Uuid,
    role: Role,
    password_hash: &str,
    secret: &str,
) -> Result<String, String> {
    sign(
        Claims {
            sub: user_id,
            role,
            purpose: TokenPurpose::PasswordReset,
            exp: expiry(Duration::minutes(RESET_TOKEN_MINUTES)),
            pwd: Some(password_fingerprint(password_hash)),
        },
        secret,
    )
}

fn expiry(lifetime: Duration) -> usize {
    (Utc::now() + lifetime).timestamp() as usize
}

fn sign(claims: Claims, secret: &str) -> Result<String, String> {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| e.to_string())
}

/// Verifies a token and checks it was issued for `purpose`
///
/// # Example
/// ```
/// use online_store_api::auth::jwt::{create_token, verify_token, TokenPurpose};
/// use online_store_api::domain::user::Role;
/// use uuid::Uuid;
///
/// let user_id = Uuid::new_v4();
/// let token = create_token(user_id, Role::Staff, "your-secret-key", 1).unwrap();
///
/// let claims = verify_token(&token, "your-secret-key", TokenPurpose::Access).expect("valid token");
/// assert_eq!(claims.sub, user_id);
/// ```
pub fn verify_token(token: &str, secret: &str, purpose: TokenPurpose) -> Result<Claims, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())?;

    if claims.purpose != purpose {
        return Err("Token was not issued for this purpose".to_string());
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-for-unit-tests";

    #[test]
    fn create_and_verify_token() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, Role::Admin, TEST_SECRET, 24).expect("valid token");

        let claims =
            verify_token(&token, TEST_SECRET, TokenPurpose::Access).expect("valid verification");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn wrong_secret_fails() {
        let token = create_token(Uuid::new_v4(), Role::Customer, TEST_SECRET, 24).unwrap();

        let result = verify_token(&token, "wrong-secret", TokenPurpose::Access);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_token_fails() {
        let result = verify_token("invalid.token.string", TEST_SECRET, TokenPurpose::Access);
        assert!(result.is_err());
    }

    #[test]
    fn token_expiry_set() {
        let token = create_token(Uuid::new_v4(), Role::Customer, TEST_SECRET, 24).unwrap();

        let claims = verify_token(&token, TEST_SECRET, TokenPurpose::Access).unwrap();
        let expiry_time = claims.exp as i64;
        let now = Utc::now().timestamp();
        let in_24_hours = (Utc::now() + Duration::hours(24)).timestamp();

        assert!(expiry_time > now);
        assert!(expiry_time <= in_24_hours + 10); // 10 second buffer
    }

    #[test]
    fn reset_token_is_not_an_access_token() {
        let user_id = Uuid::new_v4();
        let reset = create_reset_token(user_id, Role::Customer, "$2b$04$hash", TEST_SECRET).unwrap();

        assert!(verify_token(&reset, TEST_SECRET, TokenPurpose::Access).is_err());
        let claims = verify_token(&reset, TEST_SECRET, TokenPurpose::PasswordReset).unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp as i64 <= (Utc::now() + Duration::minutes(16)).timestamp());
    }

    #[test]
    fn reset_token_is_bound_to_the_password_hash() {
        let reset =
            create_reset_token(Uuid::new_v4(), Role::Customer, "$2b$04$before", TEST_SECRET)
                .unwrap();
        let claims = verify_token(&reset, TEST_SECRET, TokenPurpose::PasswordReset).unwrap();

        assert!(claims.matches_password("$2b$04$before"));
        assert!(!claims.matches_password("$2b$04$after"));
    }

    #[test]
    fn access_token_carries_no_password_fingerprint() {
        let token = create_token(Uuid::new_v4(), Role::Customer, TEST_SECRET, 1).unwrap();
        let claims = verify_token(&token, TEST_SECRET, TokenPurpose::Access).unwrap();
        assert!(claims.pwd.is_none());
        assert!(!claims.matches_password("anything"));
    }

    #[test]
    fn access_token_cannot_reset_password() {
        let token = create_token(Uuid::new_v4(), Role::Customer, TEST_SECRET, 1).unwrap();
        assert!(verify_token(&token, TEST_SECRET, TokenPurpose::PasswordReset).is_err());
    }
}
