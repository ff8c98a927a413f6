use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::catalog;
use crate::models::UserId;
use crate::store::StoreError;

pub type Payload<T> = Result<Reply<T>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Reply::new(StatusCode::OK, Some(value)))
}

pub fn created<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Reply::new(StatusCode::CREATED, Some(value)))
}

/// Success with no `data` field.
pub fn acknowledges() -> Payload<()> {
    Ok(Reply::new(StatusCode::OK, None))
}

pub fn breaks<V>(err: Error) -> Payload<V> {
    Err(err)
}

pub async fn handler404(path: Uri) -> Error {
    Error::RouteNotFound {
        path: path.to_string(),
    }
}

pub async fn handler405(method: Method, path: Uri) -> Error {
    Error::MethodNotAllowed {
        method: method.to_string(),
        path: path.to_string(),
    }
}

/// The body every endpoint answers with.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub error_no: u32,
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone)]
pub struct Reply<T> {
    status: StatusCode,
    envelope: Envelope<T>,
}

impl<T> Reply<T> {
    fn new(status: StatusCode, data: Option<T>) -> Self {
        Self {
            status,
            envelope: Envelope {
                error_no: catalog::OK,
                message: catalog::message(catalog::OK).to_string(),
                data,
            },
        }
    }
}

impl<T> IntoResponse for Reply<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    MissingFields { reason: String },
    UsernameLength { length: usize },
    MalformedEmail,
    UserNotFound { id: UserId },
    InvalidResetKey,
    InvalidCredentials,
    InvalidToken,
    PermissionDenied { caller: UserId, target: UserId },
    CreateFailed { duplicate: bool, message: String },
    UpdateFailed { message: String },
    NotImplemented { operation: &'static str },
    RouteNotFound { path: String },
    MethodNotAllowed { method: String, path: String },
    InternalError { kind: &'static str, message: String },
}

impl Error {
    pub fn missing<S: Into<String>>(reason: S) -> Error {
        Error::MissingFields {
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Error::MissingFields { .. } => catalog::MISSING_FIELDS,
            Error::UsernameLength { .. } => catalog::USERNAME_LENGTH,
            Error::MalformedEmail => catalog::MALFORMED_EMAIL,
            Error::UserNotFound { .. } => catalog::USER_NOT_FOUND,
            Error::InvalidResetKey => catalog::INVALID_RESET_KEY,
            Error::InvalidCredentials => catalog::INVALID_CREDENTIALS,
            Error::InvalidToken => catalog::INVALID_TOKEN,
            Error::PermissionDenied { .. } => catalog::PERMISSION_DENIED,
            Error::CreateFailed { .. } => catalog::CREATE_FAILED,
            Error::UpdateFailed { .. } => catalog::UPDATE_FAILED,
            Error::NotImplemented { .. } => catalog::NOT_IMPLEMENTED,
            Error::RouteNotFound { .. } => catalog::ROUTE_NOT_FOUND,
            Error::MethodNotAllowed { .. } => catalog::METHOD_NOT_ALLOWED,
            Error::InternalError { .. } => catalog::INTERNAL,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingFields { .. } | Error::UsernameLength { .. } | Error::MalformedEmail => {
                StatusCode::NOT_ACCEPTABLE
            }
            Error::UserNotFound { .. } | Error::InvalidResetKey | Error::RouteNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            Error::InvalidCredentials | Error::InvalidToken => StatusCode::UNAUTHORIZED,
            Error::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            Error::CreateFailed {
                duplicate: true, ..
            } => StatusCode::CONFLICT,
            Error::CreateFailed { .. } | Error::UpdateFailed { .. } | Error::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Error::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Client-facing text. Storage details stay in the logs.
    pub fn message(&self) -> String {
        let base = catalog::message(self.code());
        match self {
            Error::RouteNotFound { path } => format!("{}: {}", base, path),
            Error::NotImplemented { operation } => format!("{}: {}", base, operation),
            Error::MethodNotAllowed { method, path } => format!("{}: {} {}", base, method, path),
            _ => base.to_string(),
        }
    }

    pub fn into_envelope(self) -> Envelope<()> {
        Envelope {
            error_no: self.code(),
            message: self.message(),
            data: None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::CreateFailed { message, .. }
            | Error::UpdateFailed { message }
            | Error::InternalError { message, .. } => {
                log::error!("request failed with {}: {}", self.code(), message)
            }
            _ => log::debug!("request rejected: {:?}", self),
        }
        (self.status(), Json(self.into_envelope())).into_response()
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::InternalError {
            kind: "DatabaseError",
            message: err.to_string(),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "HashError",
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_missing_data() {
        let json = serde_json::to_value(Error::InvalidToken.into_envelope()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "errorNo": 201, "message": "token is missing or invalid" })
        );
    }

    #[test]
    fn envelope_carries_data() {
        let reply = proceeds(vec![1, 2, 3]).unwrap();
        let json = serde_json::to_value(&reply.envelope).unwrap();
        assert_eq!(json["errorNo"], 0);
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn duplicate_create_is_a_conflict() {
        let dup = Error::CreateFailed {
            duplicate: true,
            message: String::new(),
        };
        let other = Error::CreateFailed {
            duplicate: false,
            message: String::new(),
        };
        assert_eq!(dup.code(), other.code());
        assert_eq!(dup.status(), StatusCode::CONFLICT);
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn route_not_found_mentions_path() {
        let err = Error::RouteNotFound {
            path: "/nope".to_string(),
        };
        assert!(err.message().ends_with("/nope"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
