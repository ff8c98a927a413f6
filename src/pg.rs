use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewUser, ProfilePatch, TokenData, UserData, UserId, UserWithProfile};
use crate::store::{Store, StoreError};

const USER_WITH_PROFILE: &str = "SELECT u.id, u.username, u.email, u.type, \
     p.avatar, p.about, p.labels, p.score, p.github \
     FROM profiles p JOIN users u ON u.id = p.user_id";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(16).connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<UserId, StoreError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, email, password, type, unique_key, created_at, updated_at) \
             VALUES ($1, $2, $3, 0, $4, $5, $5) RETURNING id",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.unique_key)
        .bind(user.created_at)
        .fetch_one(&mut tx)
        .await?;

        sqlx::query("INSERT INTO profiles (user_id, avatar) VALUES ($1, $2)")
            .bind(id)
            .bind(&user.avatar)
            .execute(&mut tx)
            .await?;

        // dropping `tx` on an early return rolls both inserts back
        tx.commit().await?;
        Ok(id)
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<UserWithProfile>, StoreError> {
        let rows = sqlx::query_as::<_, UserWithProfile>(&format!(
            "{} ORDER BY p.score DESC, p.user_id ASC LIMIT $1 OFFSET $2",
            USER_WITH_PROFILE
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserWithProfile>, StoreError> {
        let row = sqlx::query_as::<_, UserWithProfile>(&format!(
            "{} WHERE u.id = $1 LIMIT 1",
            USER_WITH_PROFILE
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserData>, StoreError> {
        let row = sqlx::query_as::<_, UserData>("SELECT * FROM users WHERE username = $1 LIMIT 1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_user_by_reset_key(&self, key: Uuid) -> Result<Option<UserData>, StoreError> {
        let row = sqlx::query_as::<_, UserData>("SELECT * FROM users WHERE unique_key = $1 LIMIT 1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_profile(&self, id: UserId, patch: &ProfilePatch) -> Result<bool, StoreError> {
        let res = sqlx::query(
            "UPDATE profiles SET \
             about = COALESCE($2, about), \
             labels = COALESCE($3, labels), \
             avatar = COALESCE($4, avatar), \
             github = COALESCE($5, github) \
             WHERE user_id = $1",
        )
        .bind(id)
        .bind(patch.about.as_deref())
        .bind(patch.labels.as_deref())
        .bind(patch.avatar.as_deref())
        .bind(patch.github.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() >= 1)
    }

    async fn set_password(
        &self,
        id: UserId,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query("UPDATE users SET password = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(updated_at)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() >= 1)
    }

    async fn is_master(&self, master: UserId, pupil: UserId) -> Result<bool, StoreError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM relations WHERE is_delete = 0 AND master_id = $1 AND pupil_id = $2 LIMIT 1",
        )
        .bind(master)
        .bind(pupil)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn insert_token(&self, token: &TokenData) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO tokens (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&token.token)
            .bind(token.user_id)
            .bind(token.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_token(&self, token: &str) -> Result<Option<TokenData>, StoreError> {
        let row = sqlx::query_as::<_, TokenData>("SELECT * FROM tokens WHERE token = $1 LIMIT 1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete_token(&self, token: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() >= 1)
    }
}
