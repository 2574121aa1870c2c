use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::validation::optional_text;

/// A shopper's rating of a product
///
/// # Invariants
/// - Rating is between 1 and 5
/// - One live review per (product, user), enforced by the store
#[derive(Debug, Clone)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn new(
        product_id: Uuid,
        user_id: Uuid,
        user_name: &str,
        rating: i16,
        comment: Option<&str>,
    ) -> DomainResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            product_id,
            user_id,
            user_name: user_name.to_string(),
            rating: validate_rating(rating)?,
            comment: optional_text("Comment", comment, 2000)?,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn edit(&mut self, rating: i16, comment: Option<&str>) -> DomainResult<()> {
        self.rating = validate_rating(rating)?;
        self.comment = optional_text("Comment", comment, 2000)?;
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

fn validate_rating(rating: i16) -> DomainResult<i16> {
    if (1..=5).contains(&rating) {
        Ok(rating)
    } else {
        Err(DomainError::validation("Rating must be between 1 and 5"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        let product = Uuid::new_v4();
        let user = Uuid::new_v4();
        assert!(Review::new(product, user, "An", 0, None).is_err());
        assert!(Review::new(product, user, "An", 6, None).is_err());
        assert!(Review::new(product, user, "An", 1, None).is_ok());
        assert!(Review::new(product, user, "An", 5, Some("Tốt")).is_ok());
    }

    #[test]
    fn edit_validates_rating() {
        let mut review = Review::new(Uuid::new_v4(), Uuid::new_v4(), "An", 4, None).unwrap();
        assert!(review.edit(9, None).is_err());
        assert_eq!(review.rating, 4);

        review.edit(2, Some("Giao hàng chậm")).unwrap();
        assert_eq!(review.rating, 2);
        assert_eq!(review.comment.as_deref(), Some("Giao hàng chậm"));
    }
}
