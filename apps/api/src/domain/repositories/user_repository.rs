use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::RepositoryResult;
use crate::domain::pagination::{PageRequest, RecordScope};
use crate::domain::user::value_objects::{Email, Role};
use crate::domain::user::User;

/// Filters for the admin user listing
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive match on name or email
    pub keyword: Option<String>,
    pub role: Option<Role>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if let Some(keyword) = &self.keyword {
            let keyword = keyword.to_lowercase();
            if !user.name.to_lowercase().contains(&keyword)
                && !user.email.as_str().contains(&keyword)
            {
                return false;
            }
        }
        self.role.map_or(true, |role| user.role == role)
    }
}

/// Repository trait for User accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert or update a user; a taken email yields `Duplicate`
    async fn save(&self, user: &User) -> RepositoryResult<()>;

    /// Find a user by ID within the given scope
    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<User>>;

    /// Find a user by email address, deleted or not
    async fn find_by_email(&self, email: &Email) -> RepositoryResult<Option<User>>;

    /// One page of users, newest first, with the total match count
    async fn list(
        &self,
        filter: &UserFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<User>, u64)>;

    /// Remove the row; returns false when nothing was deleted
    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}
