use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::DomainError;

/// Vietnamese phone number in its normalised local form (e.g. `0912345678`)
///
/// # Normalisation
/// - Spaces, dots, dashes and parentheses are removed
/// - A leading `+84` or `84` country code is replaced by `0`
///
/// # Invariants
/// - 10 digits, starting with `0`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// # Example
    /// ```
    /// use online_store_api::domain::customer::value_objects::PhoneNumber;
    ///
    /// let phone = PhoneNumber::new("+84 912 345 678").expect("valid phone");
    /// assert_eq!(phone.as_str(), "0912345678");
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        let raw = raw.as_ref();
        let compact: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '.' | '-' | '(' | ')'))
            .collect();

        let local = if let Some(rest) = compact.strip_prefix("+84") {
            format!("0{}", rest)
        } else if compact.len() == 11 && compact.starts_with("84") {
            format!("0{}", &compact[2..])
        } else {
            compact
        };

        if local.len() == 10 && local.starts_with('0') && local.chars().all(|c| c.is_ascii_digit())
        {
            Ok(PhoneNumber(local))
        } else {
            Err(DomainError::validation(format!(
                "Invalid phone number: {}",
                raw.trim()
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PhoneNumber::new(value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_number_is_accepted() {
        assert_eq!(PhoneNumber::new("0912345678").unwrap().as_str(), "0912345678");
    }

    #[test]
    fn separators_are_removed() {
        assert_eq!(
            PhoneNumber::new("091.234-5678").unwrap().as_str(),
            "0912345678"
        );
        assert_eq!(
            PhoneNumber::new("(091) 234 5678").unwrap().as_str(),
            "0912345678"
        );
    }

    #[test]
    fn country_code_is_normalised() {
        assert_eq!(PhoneNumber::new("+84912345678").unwrap().as_str(), "0912345678");
        assert_eq!(PhoneNumber::new("84912345678").unwrap().as_str(), "0912345678");
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(PhoneNumber::new("091234567").is_err());
        assert!(PhoneNumber::new("09123456789").is_err());
    }

    #[test]
    fn letters_are_rejected() {
        assert!(PhoneNumber::new("09123abc78").is_err());
    }

    #[test]
    fn must_start_with_zero() {
        assert!(PhoneNumber::new("1912345678").is_err());
    }
}
