use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    NewUser, ProfileData, ProfilePatch, RelationData, TokenData, UserData, UserId, UserWithProfile,
};
use crate::store::{Store, StoreError};

/// In-process store with the same semantics as the Postgres one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

#[derive(Debug, Default)]
struct Tables {
    next_user: UserId,
    next_relation: i64,
    users: BTreeMap<UserId, UserData>,
    profiles: BTreeMap<UserId, ProfileData>,
    tokens: HashMap<String, TokenData>,
    relations: Vec<RelationData>,
}

impl Tables {
    fn joined(&self, id: UserId) -> Option<UserWithProfile> {
        let user = self.users.get(&id)?;
        let profile = self.profiles.get(&id)?;
        Some(UserWithProfile {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            kind: user.kind,
            avatar: profile.avatar.clone(),
            about: profile.about.clone(),
            labels: profile.labels.clone(),
            score: profile.score,
            github: profile.github.clone(),
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Backend("writes are disabled".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn add_relation(&self, master_id: UserId, pupil_id: UserId, active: bool) {
        let mut tables = self.tables.write().await;
        tables.next_relation += 1;
        let id = tables.next_relation;
        tables.relations.push(RelationData {
            id,
            master_id,
            pupil_id,
            is_delete: if active { 0 } else { 1 },
        });
    }

    pub async fn set_score(&self, id: UserId, score: i64) {
        if let Some(profile) = self.tables.write().await.profiles.get_mut(&id) {
            profile.score = score;
        }
    }

    pub async fn set_kind(&self, id: UserId, kind: i16) {
        if let Some(user) = self.tables.write().await.users.get_mut(&id) {
            user.kind = kind;
        }
    }

    pub async fn user(&self, id: UserId) -> Option<UserData> {
        self.tables.read().await.users.get(&id).cloned()
    }

    pub async fn profile(&self, id: UserId) -> Option<ProfileData> {
        self.tables.read().await.profiles.get(&id).cloned()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn profile_count(&self) -> usize {
        self.tables.read().await.profiles.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<UserId, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        if let Some(taken) = tables.users.values().find(|u| {
            u.username == new.username || u.email == new.email || u.unique_key == new.unique_key
        }) {
            return Err(StoreError::Duplicate(format!("user {} conflicts", taken.id)));
        }

        tables.next_user += 1;
        let id = tables.next_user;
        tables.users.insert(
            id,
            UserData {
                id,
                username: new.username,
                email: new.email,
                password: new.password_hash,
                kind: 0,
                unique_key: new.unique_key,
                created_at: new.created_at,
                updated_at: new.created_at,
            },
        );
        tables.profiles.insert(
            id,
            ProfileData {
                user_id: id,
                avatar: new.avatar,
                ..ProfileData::default()
            },
        );
        Ok(id)
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<UserWithProfile>, StoreError> {
        let tables = self.tables.read().await;
        let mut ranked: Vec<&ProfileData> = tables.profiles.values().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.user_id.cmp(&b.user_id)));
        Ok(ranked
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .filter_map(|profile| tables.joined(profile.user_id))
            .collect())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserWithProfile>, StoreError> {
        Ok(self.tables.read().await.joined(id))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserData>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_reset_key(&self, key: Uuid) -> Result<Option<UserData>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.unique_key == key).cloned())
    }

    async fn update_profile(&self, id: UserId, patch: &ProfilePatch) -> Result<bool, StoreError> {
        self.check_writable()?;
        match self.tables.write().await.profiles.get_mut(&id) {
            Some(profile) => {
                patch.apply(profile);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_password(
        &self,
        id: UserId,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check_writable()?;
        match self.tables.write().await.users.get_mut(&id) {
            Some(user) => {
                user.password = password_hash.to_string();
                user.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn is_master(&self, master: UserId, pupil: UserId) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .relations
            .iter()
            .any(|r| r.is_active() && r.master_id == master && r.pupil_id == pupil))
    }

    async fn insert_token(&self, token: &TokenData) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        if tables.tokens.contains_key(&token.token) {
            return Err(StoreError::Duplicate("token".to_string()));
        }
        tables.tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_token(&self, token: &str) -> Result<Option<TokenData>, StoreError> {
        Ok(self.tables.read().await.tokens.get(token).cloned())
    }

    async fn delete_token(&self, token: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self.tables.write().await.tokens.remove(token).is_some())
    }
}
