use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::validation::{optional_text, required_text};

const MAX_NAME_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Product category (e.g. "Điện thoại", "Laptop")
#[derive(Debug, Clone)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable category fields
#[derive(Debug, Clone, Default)]
pub struct CategoryDraft {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl Category {
    pub fn new(draft: CategoryDraft) -> DomainResult<Self> {
        let now = Utc::now();
        let mut category = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            description: None,
            image: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        category.apply(draft)?;
        Ok(category)
    }

    /// Replaces the editable fields after validating them
    pub fn apply(&mut self, draft: CategoryDraft) -> DomainResult<()> {
        self.name = required_text("Category name", &draft.name, MAX_NAME_LENGTH)?;
        self.description = optional_text(
            "Description",
            draft.description.as_deref(),
            MAX_DESCRIPTION_LENGTH,
        )?;
        self.image = optional_text("Image", draft.image.as_deref(), 500)?;
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
    fn new_category_is_live() {
        let category = Category::new(CategoryDraft {
            name: " Laptop ".into(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(category.name, "Laptop");
        assert!(!category.is_deleted);
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(Category::new(CategoryDraft::default()).is_err());
    }

    #[test]
    fn soft_delete_and_restore_toggle_flag() {
        let mut category = Category::new(CategoryDraft {
            name: "Phụ kiện".into(),
            ..Default::default()
        })
        .unwrap();

        category.soft_delete();
        assert!(category.is_deleted);
        category.restore();
        assert!(!category.is_deleted);
    }
}
