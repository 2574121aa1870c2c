use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::value_objects::PhoneNumber;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::validation::required_text;

/// A delivery address belonging to a customer
///
/// Location fields follow the GHN administrative hierarchy:
/// province (numeric id) > district (numeric id) > ward (string code).
///
/// # Invariants
/// - At most one non-deleted default address per customer
///   (enforced by the repository when saving)
#[derive(Debug, Clone)]
pub struct Address {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub recipient_name: String,
    pub phone: PhoneNumber,
    pub location: Location,
    pub is_default: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Street plus the GHN province / district / ward triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub street: String,
    pub province_id: i32,
    pub province_name: String,
    pub district_id: i32,
    pub district_name: String,
    pub ward_code: String,
    pub ward_name: String,
}

impl Location {
    pub fn new(
        street: &str,
        province: (i32, &str),
        district: (i32, &str),
        ward: (&str, &str),
    ) -> DomainResult<Self> {
        if province.0 <= 0 || district.0 <= 0 {
            return Err(DomainError::validation(
                "Province and district must be selected",
            ));
        }
        Ok(Self {
            street: required_text("Street", street, 300)?,
            province_id: province.0,
            province_name: required_text("Province", province.1, 100)?,
            district_id: district.0,
            district_name: required_text("District", district.1, 100)?,
            ward_code: required_text("Ward code", ward.0, 20)?,
            ward_name: required_text("Ward", ward.1, 100)?,
        })
    }

    /// Single-line form used on orders and emails
    pub fn full_text(&self) -> String {
        format!(
            "{}, {}, {}, {}",
            self.street, self.ward_name, self.district_name, self.province_name
        )
    }
}

impl Address {
    pub fn new(
        customer_id: Uuid,
        recipient_name: &str,
        phone: PhoneNumber,
        location: Location,
        is_default: bool,
    ) -> DomainResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            customer_id,
            recipient_name: required_text("Recipient name", recipient_name, 100)?,
            phone,
            location,
            is_default,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(
        &mut self,
        recipient_name: &str,
        phone: PhoneNumber,
        location: Location,
    ) -> DomainResult<()> {
        self.recipient_name = required_text("Recipient name", recipient_name, 100)?;
        self.phone = phone;
        self.location = location;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_default(&mut self) {
        self.is_default = true;
        self.updated_at = Utc::now();
    }

    /// A deleted address stops being the default
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.is_default = false;
        self.updated_at = Utc::now();
    }

    pub fn restore(&mut self) {
        self.is_deleted = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Location {
        Location::new(
            "12 Nguyễn Huệ",
            (202, "Hồ Chí Minh"),
            (1442, "Quận 1"),
            ("20109", "Phường Bến Nghé"),
        )
        .unwrap()
    }

    #[test]
    fn full_text_joins_parts() {
        assert_eq!(
            location().full_text(),
            "12 Nguyễn Huệ, Phường Bến Nghé, Quận 1, Hồ Chí Minh"
        );
    }

    #[test]
    fn unselected_district_is_rejected() {
        let result = Location::new("x", (202, "HCM"), (0, ""), ("1", "w"));
        assert!(result.is_err());
    }

    #[test]
    fn soft_delete_clears_default() {
        let mut address = Address::new(
            Uuid::new_v4(),
            "Lan",
            PhoneNumber::new("0912345678").unwrap(),
            location(),
            true,
        )
        .unwrap();

        address.soft_delete();
        assert!(address.is_deleted);
        assert!(!address.is_default);
    }
}
