//! Service-specific error types
//!
//! Every handler error renders as `{"error":{"code","message"}}`. Clients
//! branch on `code`; the token codes are shared with `session_token::codes`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use session_token::{ErrorBody, VerifyError, codes};
use thiserror::Error;
use tracing::error;

/// Per-request errors returned by auth handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Token(VerifyError),

    #[error("missing bearer token")]
    MissingToken,

    #[error("session has been revoked")]
    SessionRevoked,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account email is not verified")]
    AccountUnverified,

    #[error("no account for that email")]
    UserNotFound,

    #[error("an account with that email already exists")]
    EmailTaken,

    #[error("one-time code is invalid or expired")]
    InvalidOtp,

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Token(_) | ApiError::MissingToken | ApiError::SessionRevoked => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::AccountUnverified => StatusCode::FORBIDDEN,
            ApiError::UserNotFound => StatusCode::NOT_FOUND,
            ApiError::EmailTaken => StatusCode::CONFLICT,
            ApiError::InvalidOtp | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Token(kind) => kind.code(),
            ApiError::MissingToken => codes::MISSING_TOKEN,
            ApiError::SessionRevoked => codes::SESSION_REVOKED,
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::AccountUnverified => "account_unverified",
            ApiError::UserNotFound => "user_not_found",
            ApiError::EmailTaken => "email_taken",
            ApiError::InvalidOtp => "invalid_otp",
            ApiError::BadRequest(_) => "invalid_request",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<session_token::Error> for ApiError {
    fn from(e: session_token::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Internal details stay in the log, not the response body
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(error = %detail, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (self.status(), Json(ErrorBody::new(self.code(), message))).into_response()
    }
}

/// Result alias for handlers
pub type Result<T> = std::result::Result<T, ApiError>;
