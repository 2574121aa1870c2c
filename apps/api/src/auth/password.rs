// Password hashing utilities
// Uses bcrypt; the cost comes from configuration so tests can run fast

pub use bcrypt::DEFAULT_COST;
use bcrypt::{hash, verify};

/// Hashes a password using bcrypt
///
/// # Example
/// ```
/// use online_store_api::auth::password::hash_password;
///
/// let hash = hash_password("my_password", 4).expect("valid hash");
/// ```
pub fn hash_password(password: &str, cost: u32) -> Result<String, String> {
    hash(password, cost).map_err(|e| e.to_string())
}

/// Verifies a password against a bcrypt hash
///
/// # Example
/// ```
/// use online_store_api::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("my_password", 4).unwrap();
/// let valid = verify_password("my_password", &hash).unwrap();
/// assert!(valid);
/// ```
pub fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    verify(password, hash).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn hash_and_verify_password() {
        let password = "test_password_123";
        let hash = hash_password(password, TEST_COST).expect("valid hash");

        let valid = verify_password(password, &hash).expect("valid verification");
        assert!(valid);
    }

    #[test]
    fn verify_wrong_password() {
        let hash = hash_password("test_password_123", TEST_COST).expect("valid hash");

        let valid = verify_password("wrong_password", &hash).expect("valid verification");
        assert!(!valid);
    }

    #[test]
    fn hash_different_outputs() {
        let password = "mật_khẩu_123";
        let hash1 = hash_password(password, TEST_COST).expect("valid hash");
        let hash2 = hash_password(password, TEST_COST).expect("valid hash");

        // Hashes should be different due to salt
        assert_ne!(hash1, hash2);

        assert!(verify_password(password, &hash1).unwrap());
        assert!(verify_password(password, &hash2).unwrap());
    }

    #[test]
    fn cost_below_minimum_is_rejected() {
        assert!(hash_password("whatever", 1).is_err());
    }
}
