//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::challenge::is_well_formed;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    TooManyRequests(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn too_many_requests() -> Self {
        Self::TooManyRequests("Too many requests, please try again later".into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

const EMAIL_MIN_LEN: usize = 3;
const EMAIL_MAX_LEN: usize = 254;
const NAME_MIN_LEN: usize = 2;
const NAME_MAX_LEN: usize = 100;

/// Validate and normalise an e-mail address. Returns the trimmed address.
pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let email = email.trim();

    if email.len() < EMAIL_MIN_LEN || email.len() > EMAIL_MAX_LEN {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if email.contains(char::is_whitespace) {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ApiError::bad_request("Invalid email address"));
    };
    if local.is_empty() || domain.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    // Needs a dot with something on both sides
    let dotted = domain
        .split_once('.')
        .is_some_and(|(host, rest)| !host.is_empty() && !rest.is_empty());
    if !dotted || domain.ends_with('.') {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    Ok(email)
}

/// Validate a submitted verification code.
pub fn validate_code(code: &str) -> Result<(), ApiError> {
    if !is_well_formed(code) {
        return Err(ApiError::bad_request(
            "Code must be exactly 6 uppercase letters",
        ));
    }
    Ok(())
}

/// Validate a name field. Returns the trimmed value.
pub fn validate_name<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    let len = value.chars().count();

    if len < NAME_MIN_LEN {
        return Err(ApiError::bad_request(format!(
            "{} must be at least {} characters",
            field, NAME_MIN_LEN
        )));
    }
    if len > NAME_MAX_LEN {
        return Err(ApiError::bad_request(format!(
            "{} cannot be longer than {} characters",
            field, NAME_MAX_LEN
        )));
    }
    Ok(value)
}

/// Validate a user id from the path.
pub fn validate_uuid(uuid: &str) -> Result<(), ApiError> {
    if uuid.is_empty() {
        return Err(ApiError::bad_request("UUID cannot be empty"));
    }
    if uuid.len() > 36 {
        return Err(ApiError::bad_request("UUID is too long"));
    }
    if uuid::Uuid::parse_str(uuid).is_err() {
        return Err(ApiError::bad_request("Invalid UUID format"));
    }
    Ok(())
}
