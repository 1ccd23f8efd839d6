//! Error types for the API.
//!
//! Every handler returns `Result<_, ApiError>`. The client always receives
//! `{"code": "...", "message": "..."}`; internal failures are logged and
//! replaced with a generic message.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use medtrack_core::{CoreError, ValidationError};
use medtrack_db::DbError;

/// API errors as seen by the client.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, "BUSINESS_RULE", message)
    }

    /// Logs `source` and hides it from the client.
    pub fn internal(source: impl std::fmt::Display) -> Self {
        error!(error = %source, "Internal error");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "An internal error occurred",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(inner) => inner.into(),
            CoreError::Forbidden { .. } => ApiError::forbidden(err.to_string()),
            CoreError::ItemNotFound(_) => ApiError::not_found(err.to_string()),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "INSUFFICIENT_STOCK", err.to_string())
            }
            CoreError::ItemExpired { .. }
            | CoreError::EmptySale
            | CoreError::SaleTooLarge { .. }
            | CoreError::AmountTooLarge { .. }
            | CoreError::InvalidPrescriptionStatus { .. }
            | CoreError::SelfModification { .. } => ApiError::business_rule(err.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Rule(core) => core.into(),
            DbError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DbError::UniqueViolation { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "DUPLICATE", err.to_string())
            }
            DbError::InUse { .. } => ApiError::new(StatusCode::BAD_REQUEST, "IN_USE", err.to_string()),
            DbError::ForeignKeyViolation { .. } => ApiError::validation(err.to_string()),
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ApiError::internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (
                ValidationError::Required { field: "name".into() }.into(),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                CoreError::Forbidden {
                    module: "inventory".into(),
                    action: "edit".into(),
                }
                .into(),
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
            ),
            (
                DbError::not_found("Inventory item", "x").into(),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                DbError::duplicate("licenseNumber", "LIC-1").into(),
                StatusCode::BAD_REQUEST,
                "DUPLICATE",
            ),
            (
                DbError::Rule(CoreError::InsufficientStock {
                    item: "Aspirin".into(),
                    available: 1,
                    requested: 2,
                })
                .into(),
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_STOCK",
            ),
            (
                DbError::QueryFailed("disk I/O error".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status, status, "{}", err);
            assert_eq!(err.code, code);
        }
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err: ApiError = DbError::Internal("secret path /var/db".into()).into();
        assert!(!err.message.contains("/var/db"));
    }
}
