use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;

/// Why a bearer token did not yield a principal.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token has no subject")]
    MissingSubject,
    #[error("user not found")]
    UserNotFound,
}

impl AuthError {
    pub fn code(self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::Malformed => "malformed_token",
            AuthError::BadSignature => "invalid_signature",
            AuthError::Expired => "token_expired",
            AuthError::MissingSubject => "missing_subject",
            AuthError::UserNotFound => "user_not_found",
        }
    }
}

/// Rejection produced by a rate limiter.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("too many requests, retry in {:.1} seconds", .retry_after.as_seconds_f64())]
pub struct RateLimited {
    pub retry_after: time::Duration,
}

impl RateLimited {
    pub fn retry_after_secs(&self) -> f64 {
        self.retry_after.as_seconds_f64()
    }

    /// Whole seconds for the `Retry-After` header, never zero.
    pub fn retry_after_header_secs(&self) -> i64 {
        (self.retry_after_secs().ceil() as i64).max(1)
    }
}

/// A contact that is absent and one owned by someone else look the same.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("contact not found")]
    NotFoundOrForbidden,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    RateLimited(#[from] RateLimited),
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Ownership(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(e) => e.code(),
            AppError::RateLimited(_) => "rate_limited",
            AppError::Ownership(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(field) => AppError::Conflict(format!("{field} already registered")),
            StoreError::MissingOwner(_) => AppError::Auth(AuthError::UserNotFound),
            StoreError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(r: JsonRejection) -> Self {
        AppError::Validation(r.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(r: QueryRejection) -> Self {
        AppError::Validation(r.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(r: PathRejection) -> Self {
        AppError::Validation(r.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        match &self {
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                (
                    status,
                    Json(json!({ "error": code, "message": "internal server error" })),
                )
                    .into_response()
            }
            AppError::RateLimited(limit) => {
                let retry_after = (limit.retry_after_secs() * 10.0).round() / 10.0;
                let mut res = (
                    status,
                    Json(json!({
                        "error": code,
                        "message": self.to_string(),
                        "retry_after": retry_after,
                    })),
                )
                    .into_response();
                res.headers_mut().insert(
                    header::RETRY_AFTER,
                    HeaderValue::from(limit.retry_after_header_secs()),
                );
                res
            }
            _ => (status, Json(json!({ "error": code, "message": self.to_string() })))
                .into_response(),
        }
    }
}
