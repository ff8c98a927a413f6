//! Numeric error codes shared with the frontend, and their messages.

pub const OK: u32 = 0;
pub const ROUTE_NOT_FOUND: u32 = 21;
pub const USER_NOT_FOUND: u32 = 22;
pub const CREATE_FAILED: u32 = 23;
pub const MISSING_FIELDS: u32 = 24;
pub const UPDATE_FAILED: u32 = 25;
pub const NOT_IMPLEMENTED: u32 = 26;
pub const METHOD_NOT_ALLOWED: u32 = 27;
pub const INVALID_RESET_KEY: u32 = 101;
pub const INVALID_CREDENTIALS: u32 = 102;
pub const USERNAME_LENGTH: u32 = 111;
pub const MALFORMED_EMAIL: u32 = 112;
pub const INVALID_TOKEN: u32 = 201;
pub const PERMISSION_DENIED: u32 = 202;
pub const INTERNAL: u32 = 500;

pub fn message(code: u32) -> &'static str {
    match code {
        OK => "ok",
        ROUTE_NOT_FOUND => "no such route",
        USER_NOT_FOUND => "user does not exist",
        CREATE_FAILED => "could not create resource",
        MISSING_FIELDS => "required fields are missing or malformed",
        UPDATE_FAILED => "could not update resource",
        NOT_IMPLEMENTED => "operation is not supported",
        METHOD_NOT_ALLOWED => "method not allowed",
        INVALID_RESET_KEY => "reset key is invalid",
        INVALID_CREDENTIALS => "username or password is incorrect",
        USERNAME_LENGTH => "username must be between 6 and 30 bytes",
        MALFORMED_EMAIL => "email address is malformed",
        INVALID_TOKEN => "token is missing or invalid",
        PERMISSION_DENIED => "not allowed to modify this resource",
        INTERNAL => "internal server error",
        _ => "unknown error",
    }
}

/// Role name shown for a user's `type` column.
pub fn role_name(kind: i16) -> &'static str {
    match kind {
        0 => "member",
        1 => "master",
        2 => "admin",
        _ => "unknown",
    }
}
