use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserData {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[sqlx(rename = "type")]
    pub kind: i16,
    #[serde(skip_serializing)]
    pub unique_key: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProfileData {
    pub user_id: UserId,
    pub avatar: String,
    pub about: String,
    pub labels: String,
    pub score: i64,
    pub github: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TokenData {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RelationData {
    pub id: i64,
    pub master_id: UserId,
    pub pupil_id: UserId,
    pub is_delete: i16,
}

impl RelationData {
    pub fn is_active(&self) -> bool {
        self.is_delete == 0
    }
}

/// A user joined with its profile, as read back for listings and fetches.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserWithProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[sqlx(rename = "type")]
    pub kind: i16,
    pub avatar: String,
    pub about: String,
    pub labels: String,
    pub score: i64,
    pub github: String,
}

/// Everything needed to insert a user and its profile in one go.
/// `password_hash` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: String,
    pub unique_key: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update; `None` leaves the column as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub about: Option<String>,
    pub labels: Option<String>,
    pub avatar: Option<String>,
    pub github: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.about.is_none() && self.labels.is_none() && self.avatar.is_none() && self.github.is_none()
    }

    pub fn apply(&self, profile: &mut ProfileData) {
        if let Some(about) = &self.about {
            profile.about = about.clone();
        }
        if let Some(labels) = &self.labels {
            profile.labels = labels.clone();
        }
        if let Some(avatar) = &self.avatar {
            profile.avatar = avatar.clone();
        }
        if let Some(github) = &self.github {
            profile.github = github.clone();
        }
    }
}
