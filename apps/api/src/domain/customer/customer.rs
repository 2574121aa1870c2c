use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::value_objects::PhoneNumber;
use crate::domain::errors::DomainResult;
use crate::domain::user::value_objects::Email;
use crate::domain::validation::required_text;

/// A buyer, identified by phone number
///
/// Customers exist independently of user accounts so that guests can
/// check out; `user_id` links the record to an account when there is one.
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: PhoneNumber,
    pub email: Option<Email>,
    pub user_id: Option<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity data used for inserting or refreshing a customer by phone
#[derive(Debug, Clone)]
pub struct CustomerContact {
    pub name: String,
    pub phone: PhoneNumber,
    pub email: Option<Email>,
    pub user_id: Option<Uuid>,
}

impl CustomerContact {
    pub fn new(
        name: &str,
        phone: PhoneNumber,
        email: Option<Email>,
        user_id: Option<Uuid>,
    ) -> DomainResult<Self> {
        Ok(Self {
            name: required_text("Customer name", name, 100)?,
            phone,
            email,
            user_id,
        })
    }
}

impl Customer {
    pub fn new(contact: CustomerContact) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: contact.name,
            phone: contact.phone,
            email: contact.email,
            user_id: contact.user_id,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the upsert rules for an existing customer with the same phone
    ///
    /// - name is replaced and email is replaced when provided, unless the
    ///   customer is linked to an account other than the contact's
    /// - an account link is only set when the customer has none; an
    ///   existing link is never moved to another account
    /// - a soft-deleted customer is revived
    pub fn merge_contact(&mut self, contact: CustomerContact) {
        let may_edit = self.user_id.is_none() || self.user_id == contact.user_id;
        if may_edit {
            self.name = contact.name;
            if contact.email.is_some() {
                self.email = contact.email;
            }
        }
        if self.user_id.is_none() {
            self.user_id = contact.user_id;
        }
        self.is_deleted = false;
        self.updated_at = Utc::now();
    }

    /// Replaces the editable fields; the account link is kept
    pub fn update(&mut self, name: &str, phone: PhoneNumber, email: Option<Email>) -> DomainResult<()> {
        self.name = required_text("Customer name", name, 100)?;
        self.phone = phone;
        self.email = email;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// True when `user_id` owns this customer record
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }

    /// True when the record already belongs to an account other than `user_id`
    pub fn is_linked_to_other(&self, user_id: Uuid) -> bool {
        self.user_id.is_some_and(|owner| owner != user_id)
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

    fn contact(name: &str, email: Option<&str>, user_id: Option<Uuid>) -> CustomerContact {
        CustomerContact::new(
            name,
            PhoneNumber::new("0912345678").unwrap(),
            email.map(|e| Email::new(e).unwrap()),
            user_id,
        )
        .unwrap()
    }

    #[test]
    fn merge_replaces_name_and_keeps_known_email() {
        let mut customer = Customer::new(contact("Minh", Some("minh@example.com"), None));
        customer.merge_contact(contact("Nguyễn Minh", None, None));

        assert_eq!(customer.name, "Nguyễn Minh");
        assert_eq!(customer.email.as_ref().unwrap().as_str(), "minh@example.com");
    }

    #[test]
    fn merge_revives_deleted_customer() {
        let mut customer = Customer::new(contact("Minh", None, None));
        customer.soft_delete();
        customer.merge_contact(contact("Minh", None, None));
        assert!(!customer.is_deleted);
    }

    #[test]
    fn merge_links_account_once_known() {
        let user_id = Uuid::new_v4();
        let mut customer = Customer::new(contact("Minh", None, None));
        assert!(!customer.is_owned_by(user_id));

        customer.merge_contact(contact("Minh", None, Some(user_id)));
        assert!(customer.is_owned_by(user_id));

        customer.merge_contact(contact("Minh", None, None));
        assert!(customer.is_owned_by(user_id));
    }

    #[test]
    fn merge_never_moves_an_existing_link() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut customer = Customer::new(contact("Minh", None, Some(owner)));

        customer.merge_contact(contact("Kẻ lạ", Some("la@example.com"), Some(other)));
        assert!(customer.is_owned_by(owner));
        assert_eq!(customer.name, "Minh");
        assert!(customer.email.is_none());
        assert!(customer.is_linked_to_other(other));
        assert!(!customer.is_linked_to_other(owner));
    }

    #[test]
    fn blank_name_is_rejected() {
        let result = CustomerContact::new(" ", PhoneNumber::new("0912345678").unwrap(), None, None);
        assert!(result.is_err());
    }
}
