use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::value_objects::{Email, Role};
use crate::domain::customer::value_objects::PhoneNumber;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::validation::required_text;

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 100;

/// A store account (shopper, staff member or administrator)
///
/// # Invariants
/// - Name is not blank
/// - Email is unique across all accounts (enforced by the store)
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<PhoneNumber>,
    pub avatar: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new active account with the customer role
    pub fn register(
        name: &str,
        email: Email,
        password_hash: String,
        phone: Option<PhoneNumber>,
    ) -> DomainResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: required_text("Name", name, MAX_NAME_LENGTH)?,
            email,
            password_hash,
            role: Role::Customer,
            phone,
            avatar: None,
            is_active: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn rename(&mut self, name: &str) -> DomainResult<()> {
        self.name = required_text("Name", name, MAX_NAME_LENGTH)?;
        self.touch();
        Ok(())
    }

    /// True when the account may sign in
    pub fn can_sign_in(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.touch();
    }

    pub fn restore(&mut self) {
        self.is_deleted = false;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Checks the plaintext password policy before hashing
pub fn validate_password(password: &str) -> DomainResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(DomainError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email::new("lan@example.com").unwrap()
    }

    #[test]
    fn register_defaults_to_active_customer() {
        let user = User::register("Trần Thị Lan", email(), "hash".into(), None).unwrap();
        assert_eq!(user.role, Role::Customer);
        assert!(user.is_active);
        assert!(!user.is_deleted);
        assert!(user.can_sign_in());
    }

    #[test]
    fn register_rejects_blank_name() {
        assert!(User::register("  ", email(), "hash".into(), None).is_err());
    }

    #[test]
    fn deleted_or_inactive_users_cannot_sign_in() {
        let mut user = User::register("Lan", email(), "hash".into(), None).unwrap();
        user.soft_delete();
        assert!(!user.can_sign_in());

        user.restore();
        user.is_active = false;
        assert!(!user.can_sign_in());
    }

    #[test]
    fn password_policy() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
    }
}
