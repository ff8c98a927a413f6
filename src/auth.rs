use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::{async_trait, Extension, Json};
use chrono::{DateTime, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::err::{acknowledges, breaks, created, Error, Payload};
use crate::models::{TokenData, UserId};
use crate::store::Store;
use crate::{validate, AppState};

pub const TOKEN_HEADER: &str = "Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Success(UserId),
    TokenExpired,
    InvalidToken,
}

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Pbkdf2.hash_password(password.as_bytes(), &salt)?.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let hash = PasswordHash::new(hash)?;
    Ok(Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok())
}

/// Hex SHA-256 of 32 random bytes.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = thread_rng().gen();
    let mut hasher: Sha256 = Digest::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Resolves a raw header value against the token table.
/// Expired tokens are deleted as they are seen.
pub async fn ensure_authenticated(token: Option<&str>, store: &dyn Store) -> Result<AuthResult, Error> {
    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => return Ok(AuthResult::InvalidToken),
    };

    let found = match store.find_token(token).await? {
        Some(found) => found,
        None => return Ok(AuthResult::InvalidToken),
    };

    if Utc::now() > found.expires_at {
        store.delete_token(token).await?;
        return Ok(AuthResult::TokenExpired);
    }
    Ok(AuthResult::Success(found.user_id))
}

/// The verified identity behind the `Token` header.
/// Rejects the request with `InvalidToken` when it does not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub token: String,
}

/// Like [`Caller`] but never rejects: any failure to resolve the token,
/// including a storage error, yields `MaybeCaller(None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaybeCaller(pub Option<Caller>);

fn header_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

fn app_state(parts: &Parts) -> Result<AppState, Error> {
    parts
        .extensions
        .get::<AppState>()
        .cloned()
        .ok_or(Error::InternalError {
            kind: "MissingState",
            message: "application state is not installed".to_string(),
        })
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = app_state(parts)?;
        let token = header_token(parts);
        match ensure_authenticated(token, state.store.as_ref()).await? {
            AuthResult::Success(id) => Ok(Caller {
                id,
                token: token.unwrap_or_default().to_string(),
            }),
            AuthResult::TokenExpired | AuthResult::InvalidToken => Err(Error::InvalidToken),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeCaller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Caller::from_request_parts(parts, state).await {
            Ok(caller) => Ok(MaybeCaller(Some(caller))),
            Err(err) => {
                log::debug!("continuing without caller: {:?}", err);
                Ok(MaybeCaller(None))
            }
        }
    }
}

pub async fn login(
    Extension(state): Extension<AppState>,
    body: Result<Json<LoginUser>, axum::extract::rejection::JsonRejection>,
) -> Payload<IssuedToken> {
    let Json(login) = body.map_err(|rejection| Error::missing(rejection.body_text()))?;
    validate::require(&[("username", login.username.as_str()), ("password", login.password.as_str())])?;

    let user = match state.store.find_user_by_username(&login.username).await? {
        Some(user) => user,
        None => return breaks(Error::InvalidCredentials),
    };
    if !verify_password(&login.password, &user.password)? {
        return breaks(Error::InvalidCredentials);
    }

    let issued = TokenData {
        token: generate_token(),
        user_id: user.id,
        expires_at: Utc::now() + state.config.token_ttl,
    };
    state.store.insert_token(&issued).await?;
    log::info!("issued token for user {}", user.id);

    created(IssuedToken {
        token: issued.token,
        user_id: issued.user_id,
        expires_at: issued.expires_at,
    })
}

pub async fn logout(Extension(state): Extension<AppState>, caller: Caller) -> Payload<()> {
    state.store.delete_token(&caller.token).await?;
    acknowledges()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::Duration;

    #[test]
    fn passwords_are_salted_and_verifiable() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();
        assert_ne!(first, second);
        assert_ne!(first, "hunter22");
        assert!(verify_password("hunter22", &first).unwrap());
        assert!(!verify_password("hunter23", &first).unwrap());
    }

    #[test]
    fn tokens_are_hex_sha256() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[tokio::test]
    async fn resolves_live_tokens() {
        let store = MemoryStore::new();
        store
            .insert_token(&TokenData {
                token: "live".to_string(),
                user_id: 7,
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();
        assert_eq!(
            ensure_authenticated(Some("live"), &store).await.unwrap(),
            AuthResult::Success(7)
        );
        assert_eq!(
            ensure_authenticated(Some("other"), &store).await.unwrap(),
            AuthResult::InvalidToken
        );
        assert_eq!(ensure_authenticated(Some(""), &store).await.unwrap(), AuthResult::InvalidToken);
        assert_eq!(ensure_authenticated(None, &store).await.unwrap(), AuthResult::InvalidToken);
    }

    #[tokio::test]
    async fn expired_tokens_are_dropped() {
        let store = MemoryStore::new();
        store
            .insert_token(&TokenData {
                token: "stale".to_string(),
                user_id: 7,
                expires_at: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();
        assert_eq!(
            ensure_authenticated(Some("stale"), &store).await.unwrap(),
            AuthResult::TokenExpired
        );
        assert!(store.find_token("stale").await.unwrap().is_none());
    }
}
