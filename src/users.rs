use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{self, Caller, MaybeCaller};
use crate::catalog;
use crate::err::{acknowledges, breaks, created, proceeds, Error, Payload};
use crate::models::{NewUser, ProfilePatch, UserId, UserWithProfile};
use crate::{validate, AppState};

pub async fn create_user(
    Extension(state): Extension<AppState>,
    body: Result<Json<CreateUser>, JsonRejection>,
) -> Payload<CreatedUser> {
    let Json(user) = body.map_err(|rejection| Error::missing(rejection.body_text()))?;
    validate::require(&[
        ("username", user.username.as_str()),
        ("email", user.email.as_str()),
        ("password", user.password.as_str()),
    ])?;
    validate::username(&user.username)?;
    validate::email(&user.email)?;

    let new = NewUser {
        username: user.username,
        email: user.email,
        password_hash: auth::hash_password(&user.password)?,
        avatar: state.config.default_avatar.clone(),
        unique_key: Uuid::new_v4(),
        created_at: Utc::now(),
    };

    let id = state
        .store
        .create_user(new)
        .await
        .map_err(|err| Error::CreateFailed {
            duplicate: err.is_duplicate(),
            message: err.to_string(),
        })?;
    log::info!("registered user {}", id);

    created(CreatedUser { resource_id: id })
}

pub async fn list_users(
    Extension(state): Extension<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Payload<Vec<UserView>> {
    let Query(params) = params.map_err(|rejection| Error::missing(rejection.body_text()))?;
    let (offset, limit) = params.window(state.config.page_limit, state.config.page_limit_max);
    let users = state.store.list_users(offset, limit).await?;
    proceeds(users.into_iter().map(|user| UserView::new(user, false)).collect())
}

/// `isMaster` reports whether the target user mentors the caller. An
/// unresolvable token is not an error here; it just reads as `false`.
pub async fn fetch_user(
    Extension(state): Extension<AppState>,
    MaybeCaller(caller): MaybeCaller,
    id: Result<Path<UserId>, PathRejection>,
) -> Payload<UserView> {
    let Path(id) = id.map_err(|rejection| Error::missing(rejection.body_text()))?;

    let user = match state.store.find_user(id).await? {
        Some(user) => user,
        None => return breaks(Error::UserNotFound { id }),
    };

    let is_master = match caller {
        Some(caller) => state
            .store
            .is_master(user.id, caller.id)
            .await
            .unwrap_or_else(|err| {
                log::warn!("relation lookup for {} failed: {}", user.id, err);
                false
            }),
        None => false,
    };

    proceeds(UserView::new(user, is_master))
}

pub async fn update_user(
    Extension(state): Extension<AppState>,
    caller: Caller,
    id: Result<Path<UserId>, PathRejection>,
    body: Result<Json<UpdateUser>, JsonRejection>,
) -> Payload<()> {
    let Path(id) = id.map_err(|rejection| Error::missing(rejection.body_text()))?;

    if state.store.find_user(id).await?.is_none() {
        return breaks(Error::UserNotFound { id });
    }
    if caller.id != id {
        return breaks(Error::PermissionDenied {
            caller: caller.id,
            target: id,
        });
    }

    let Json(update) = body.map_err(|rejection| Error::missing(rejection.body_text()))?;
    let patch = update.into_patch();
    if patch.is_empty() {
        return acknowledges();
    }

    match state.store.update_profile(id, &patch).await {
        Ok(true) => acknowledges(),
        Ok(false) => breaks(Error::UpdateFailed {
            message: format!("user {} has no profile", id),
        }),
        Err(err) => breaks(Error::UpdateFailed {
            message: err.to_string(),
        }),
    }
}

pub async fn delete_user(id: Result<Path<UserId>, PathRejection>) -> Payload<()> {
    let Path(id) = id.map_err(|rejection| Error::missing(rejection.body_text()))?;
    log::debug!("refusing to delete user {}", id);
    breaks(Error::NotImplemented {
        operation: "delete user",
    })
}

/// Resets the password of whoever holds `key`. The key stays valid.
pub async fn reset_password(
    Extension(state): Extension<AppState>,
    body: Result<Json<ResetPassword>, JsonRejection>,
) -> Payload<()> {
    let Json(reset) = body.map_err(|rejection| Error::missing(rejection.body_text()))?;
    validate::require(&[("key", reset.key.as_str()), ("password", reset.password.as_str())])?;

    let key = match Uuid::parse_str(reset.key.trim()) {
        Ok(key) => key,
        Err(_) => return breaks(Error::InvalidResetKey),
    };
    let user = match state.store.find_user_by_reset_key(key).await? {
        Some(user) => user,
        None => return breaks(Error::InvalidResetKey),
    };

    let hash = auth::hash_password(&reset.password)?;
    match state.store.set_password(user.id, &hash, Utc::now()).await {
        Ok(true) => {
            log::info!("password reset for user {}", user.id);
            acknowledges()
        }
        Ok(false) => breaks(Error::UpdateFailed {
            message: format!("user {} vanished during reset", user.id),
        }),
        Err(err) => breaks(Error::UpdateFailed {
            message: err.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub resource_id: UserId,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub row: Option<String>,
}

impl ListParams {
    /// `(offset, limit)` for this page. Bad or missing numbers take the defaults.
    pub fn window(&self, default_row: i64, max_row: i64) -> (i64, i64) {
        let positive = |raw: &Option<String>| {
            raw.as_deref()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|n| *n > 0)
        };
        let page = positive(&self.page).unwrap_or(1);
        let row = positive(&self.row).unwrap_or(default_row).min(max_row);
        (page.saturating_sub(1).saturating_mul(row), row)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub about: Option<String>,
    pub labels: Option<String>,
    pub avatar: Option<String>,
    pub github: Option<String>,
}

impl UpdateUser {
    pub fn into_patch(self) -> ProfilePatch {
        ProfilePatch {
            about: validate::non_empty(self.about),
            labels: validate::non_empty(self.labels),
            avatar: validate::non_empty(self.avatar),
            github: validate::non_empty(self.github),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPassword {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub password: String,
}

/// Public shape of a user in listings and fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub about: String,
    pub labels: String,
    pub score: i64,
    pub auth: String,
    pub github: String,
    pub is_master: bool,
}

impl UserView {
    pub fn new(user: UserWithProfile, is_master: bool) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
            about: user.about,
            labels: user.labels,
            score: user.score,
            auth: catalog::role_name(user.kind).to_string(),
            github: user.github,
            is_master,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, row: Option<&str>) -> ListParams {
        ListParams {
            page: page.map(str::to_string),
            row: row.map(str::to_string),
        }
    }

    #[test]
    fn window_defaults() {
        assert_eq!(params(None, None).window(10, 100), (0, 10));
        assert_eq!(params(Some("x"), Some("y")).window(10, 100), (0, 10));
        assert_eq!(params(Some("0"), Some("-5")).window(10, 100), (0, 10));
    }

    #[test]
    fn window_offsets() {
        assert_eq!(params(Some("2"), Some("10")).window(10, 100), (10, 10));
        assert_eq!(params(Some("3"), None).window(7, 100), (14, 7));
        assert_eq!(params(Some("1"), Some("500")).window(10, 100), (0, 100));
    }

    #[test]
    fn window_does_not_overflow() {
        let huge = i64::MAX.to_string();
        let (offset, limit) = params(Some(&huge), Some("100")).window(10, 100);
        assert_eq!(limit, 100);
        assert_eq!(offset, i64::MAX);
    }

    #[test]
    fn blank_update_fields_are_ignored() {
        let patch = UpdateUser {
            about: Some("mentor of many".into()),
            labels: Some(String::new()),
            avatar: None,
            github: Some("octocat".into()),
        }
        .into_patch();
        assert_eq!(
            patch,
            ProfilePatch {
                about: Some("mentor of many".into()),
                labels: None,
                avatar: None,
                github: Some("octocat".into()),
            }
        );
    }
}
