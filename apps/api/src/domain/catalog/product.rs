use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::validation::{optional_text, required_text};

/// An item for sale
///
/// # Invariants
/// - Price is not negative
/// - Stock is not negative
/// - `rating` is the mean of live review ratings (0 when there are none)
#[derive(Debug, Clone)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub image: Option<String>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub rating: f64,
    pub num_reviews: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable product fields
#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub image: Option<String>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
}

impl Product {
    pub fn new(draft: ProductDraft) -> DomainResult<Self> {
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            description: None,
            price: Decimal::ZERO,
            stock: 0,
            image: None,
            category_id: None,
            supplier_id: None,
            rating: 0.0,
            num_reviews: 0,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        product.apply(draft)?;
        Ok(product)
    }

    pub fn apply(&mut self, draft: ProductDraft) -> DomainResult<()> {
        if draft.price.is_sign_negative() {
            return Err(DomainError::validation("Price cannot be negative"));
        }
        if draft.stock < 0 {
            return Err(DomainError::validation("Stock cannot be negative"));
        }

        self.name = required_text("Product name", &draft.name, 200)?;
        self.description = optional_text("Description", draft.description.as_deref(), 5000)?;
        self.price = draft.price;
        self.stock = draft.stock;
        self.image = optional_text("Image", draft.image.as_deref(), 500)?;
        self.category_id = draft.category_id;
        self.supplier_id = draft.supplier_id;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replaces the cached review summary
    pub fn set_rating(&mut self, summary: RatingSummary) {
        self.rating = summary.average;
        self.num_reviews = summary.count;
        self.updated_at = Utc::now();
    }

    pub fn is_available(&self, quantity: i32) -> bool {
        !self.is_deleted && quantity > 0 && self.stock >= quantity
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

/// Mean rating and count over a product's live reviews
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i32,
}

impl RatingSummary {
    pub fn from_ratings(ratings: &[i16]) -> Self {
        if ratings.is_empty() {
            return Self {
                average: 0.0,
                count: 0,
            };
        }
        let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
        let count = ratings.len();
        let average = sum as f64 / count as f64;
        Self {
            // one decimal place, the way the storefront displays stars
            average: (average * 10.0).round() / 10.0,
            count: i32::try_from(count).unwrap_or(i32::MAX),
        }
    }
}

/// Ordering for product listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
}

/// Filters for product listings
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub keyword: Option<String>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
}

impl ProductFilter {
    /// In-process equivalent of the SQL filter
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(keyword) = &self.keyword {
            if !product.name.to_lowercase().contains(&keyword.to_lowercase()) {
                return false;
            }
        }
        if self.category_id.is_some() && product.category_id != self.category_id {
            return false;
        }
        if self.supplier_id.is_some() && product.supplier_id != self.supplier_id {
            return false;
        }
        if let Some(min) = self.min_price {
            if product.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if product.price > max {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "iPhone 15".into(),
            price: Decimal::new(22_990_000, 0),
            stock: 5,
            ..Default::default()
        }
    }

    #[test]
    fn new_product_has_no_reviews() {
        let product = Product::new(draft()).unwrap();
        assert_eq!(product.rating, 0.0);
        assert_eq!(product.num_reviews, 0);
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut bad = draft();
        bad.price = Decimal::new(-1, 0);
        assert!(Product::new(bad).is_err());
    }

    #[test]
    fn negative_stock_is_rejected() {
        let mut bad = draft();
        bad.stock = -1;
        assert!(Product::new(bad).is_err());
    }

    #[test]
    fn availability_checks_stock_and_flag() {
        let mut product = Product::new(draft()).unwrap();
        assert!(product.is_available(5));
        assert!(!product.is_available(6));
        assert!(!product.is_available(0));

        product.soft_delete();
        assert!(!product.is_available(1));
    }

    #[test]
    fn rating_summary_rounds_to_one_decimal() {
        let summary = RatingSummary::from_ratings(&[5, 4, 4]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, 4.3);
    }

    #[test]
    fn rating_summary_of_nothing_is_zero() {
        let summary = RatingSummary::from_ratings(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average, 0.0);
    }

    #[test]
    fn filter_matches_keyword_case_insensitively() {
        let product = Product::new(draft()).unwrap();
        let filter = ProductFilter {
            keyword: Some("IPHONE".into()),
            ..Default::default()
        };
        assert!(filter.matches(&product));
    }

    #[test]
    fn filter_applies_price_bounds() {
        let product = Product::new(draft()).unwrap();
        let too_cheap = ProductFilter {
            max_price: Some(Decimal::new(1_000_000, 0)),
            ..Default::default()
        };
        let in_range = ProductFilter {
            min_price: Some(Decimal::new(20_000_000, 0)),
            max_price: Some(Decimal::new(25_000_000, 0)),
            ..Default::default()
        };
        assert!(!too_cheap.matches(&product));
        assert!(in_range.matches(&product));
    }
}
