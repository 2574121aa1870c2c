use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::DomainError;

/// Email value object representing a valid, lower-cased email address
///
/// # Invariants
/// - Exactly one '@' with a non-empty local part and domain
/// - Domain contains a '.'
/// - No whitespace
/// - Stored lower-cased so uniqueness is case-insensitive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Creates a new Email value object
    ///
    /// # Example
    /// ```
    /// use online_store_api::domain::user::value_objects::Email;
    ///
    /// let email = Email::new(" Khach@Example.com ").expect("valid email");
    /// assert_eq!(email.as_str(), "khach@example.com");
    /// ```
    pub fn new(email: impl Into<String>) -> Result<Self, DomainError> {
        let email = email.into().trim().to_lowercase();
        if Self::is_valid(&email) {
            Ok(Email(email))
        } else {
            Err(DomainError::validation(format!("Invalid email: {}", email)))
        }
    }

    fn is_valid(email: &str) -> bool {
        if email.chars().any(char::is_whitespace) {
            return false;
        }
        match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        }
    }

    /// Returns the email as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Email::new(value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// Account role used for authorization checks
///
/// `Admin` can do everything `Staff` can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

impl Role {
    /// Returns true if this role satisfies the `required` role
    ///
    /// # Example
    /// ```
    /// use online_store_api::domain::user::value_objects::Role;
    ///
    /// assert!(Role::Admin.satisfies(Role::Staff));
    /// assert!(!Role::Customer.satisfies(Role::Staff));
    /// ```
    pub fn satisfies(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    fn rank(&self) -> u8 {
        match self {
            Role::Customer => 0,
            Role::Staff => 1,
            Role::Admin => 2,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.satisfies(Role::Staff)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Staff => write!(f, "staff"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email() {
        assert!(Email::new("test@example.com").is_ok());
    }

    #[test]
    fn valid_email_with_subdomain() {
        assert!(Email::new("user@mail.example.com.vn").is_ok());
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let email = Email::new("  Nguyen.Van.A@Gmail.COM ").unwrap();
        assert_eq!(email.as_str(), "nguyen.van.a@gmail.com");
    }

    #[test]
    fn invalid_email_no_at_symbol() {
        assert!(Email::new("invalid").is_err());
    }

    #[test]
    fn invalid_email_no_domain_dot() {
        assert!(Email::new("a@b").is_err());
    }

    #[test]
    fn invalid_email_two_at_symbols() {
        assert!(Email::new("a@b@c.com").is_err());
    }

    #[test]
    fn invalid_email_inner_whitespace() {
        assert!(Email::new("a b@c.com").is_err());
    }

    #[test]
    fn invalid_email_empty() {
        assert!(Email::new("").is_err());
    }

    #[test]
    fn email_deserializes_through_validation() {
        let ok: Result<Email, _> = serde_json::from_str("\"Shop@Example.com\"");
        assert_eq!(ok.unwrap().as_str(), "shop@example.com");

        let bad: Result<Email, _> = serde_json::from_str("\"not-an-email\"");
        assert!(bad.is_err());
    }

    #[test]
    fn role_hierarchy() {
        assert!(Role::Admin.satisfies(Role::Admin));
        assert!(Role::Admin.satisfies(Role::Customer));
        assert!(Role::Staff.satisfies(Role::Staff));
        assert!(!Role::Staff.satisfies(Role::Admin));
        assert!(!Role::Customer.is_staff());
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::Customer.to_string(), "customer");
        assert_eq!(Role::Staff.to_string(), "staff");
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
