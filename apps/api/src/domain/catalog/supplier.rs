use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::customer::value_objects::PhoneNumber;
use crate::domain::errors::DomainResult;
use crate::domain::user::value_objects::Email;
use crate::domain::validation::{optional_text, required_text};

/// A vendor the store buys products from
#[derive(Debug, Clone)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub email: Option<Email>,
    pub phone: Option<PhoneNumber>,
    pub address: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable supplier fields, still unvalidated
#[derive(Debug, Clone, Default)]
pub struct SupplierDraft {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl Supplier {
    pub fn new(draft: SupplierDraft) -> DomainResult<Self> {
        let now = Utc::now();
        let mut supplier = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            email: None,
            phone: None,
            address: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        supplier.apply(draft)?;
        Ok(supplier)
    }

    pub fn apply(&mut self, draft: SupplierDraft) -> DomainResult<()> {
        self.name = required_text("Supplier name", &draft.name, 150)?;
        self.email = optional_text("Email", draft.email.as_deref(), 254)?
            .map(Email::new)
            .transpose()?;
        self.phone = optional_text("Phone", draft.phone.as_deref(), 20)?
            .map(PhoneNumber::new)
            .transpose()?;
        self.address = optional_text("Address", draft.address.as_deref(), 500)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
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

    #[test]
    fn contact_fields_are_validated() {
        let supplier = Supplier::new(SupplierDraft {
            name: "Công ty ABC".into(),
            email: Some("Sales@ABC.vn".into()),
            phone: Some("028 3822 1234".into()),
            address: None,
        })
        .unwrap();

        assert_eq!(supplier.email.unwrap().as_str(), "sales@abc.vn");
        assert_eq!(supplier.phone.unwrap().as_str(), "02838221234");
    }

    #[test]
    fn invalid_email_is_rejected() {
        let result = Supplier::new(SupplierDraft {
            name: "ABC".into(),
            email: Some("nope".into()),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let supplier = Supplier::new(SupplierDraft {
            name: "ABC".into(),
            email: Some("".into()),
            phone: Some("  ".into()),
            address: Some("".into()),
        })
        .unwrap();

        assert!(supplier.email.is_none());
        assert!(supplier.phone.is_none());
        assert!(supplier.address.is_none());
    }
}
