use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewUser, ProfilePatch, TokenData, UserData, UserId, UserWithProfile};

pub type SharedStore = Arc<dyn Store>;

/// Everything the handlers need from persistence. Implemented by
/// [`crate::pg::PgStore`] and [`crate::memory::MemoryStore`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts the user and its profile atomically, returning the new id.
    async fn create_user(&self, user: NewUser) -> Result<UserId, StoreError>;

    /// Users ordered by profile score, highest first.
    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<UserWithProfile>, StoreError>;

    async fn find_user(&self, id: UserId) -> Result<Option<UserWithProfile>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserData>, StoreError>;

    async fn find_user_by_reset_key(&self, key: Uuid) -> Result<Option<UserData>, StoreError>;

    /// Returns false when no profile belongs to `id`.
    async fn update_profile(&self, id: UserId, patch: &ProfilePatch) -> Result<bool, StoreError>;

    async fn set_password(
        &self,
        id: UserId,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Whether an active relation names `master` as mentor of `pupil`.
    async fn is_master(&self, master: UserId, pupil: UserId) -> Result<bool, StoreError>;

    async fn insert_token(&self, token: &TokenData) -> Result<(), StoreError>;

    async fn find_token(&self, token: &str) -> Result<Option<TokenData>, StoreError>;

    async fn delete_token(&self, token: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate(_))
    }
}

const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return StoreError::Duplicate(db.message().to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}
