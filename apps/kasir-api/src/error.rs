//! Error types for the Kasir API.
//!
//! ```text
//! EngineError::Core(SaleNotFound | ApprovalNotFound) → 404 {message}
//! EngineError::Core(_)                               → 422 {message, errors?}
//! EngineError::Db(NotFound)                          → 404 {message}
//! EngineError::Db(_)                                 → 500 {message}
//! JSON / query / header rejections                   → 422 {message, errors?}
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use kasir_core::{CoreError, FieldErrors, ValidationError};
use kasir_db::DbError;
use kasir_engine::EngineError;

/// Shown instead of storage details.
pub const INTERNAL_MESSAGE: &str = "Terjadi kesalahan pada server.";

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Unprocessable {
        message: String,
        errors: Option<FieldErrors>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(e) => e.into(),
            EngineError::Db(DbError::NotFound { entity, id }) => {
                ApiError::NotFound(format!("{entity} tidak ditemukan: {id}"))
            }
            EngineError::Db(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SaleNotFound(_) | CoreError::ApprovalNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            _ => ApiError::Unprocessable {
                errors: err.field_errors(),
                message: err.to_string(),
            },
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Unprocessable {
            message: rejection.body_text(),
            errors: None,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Unprocessable {
            message: rejection.body_text(),
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Unprocessable { message, errors } => ErrorBody { message, errors },
            ApiError::NotFound(message) => ErrorBody {
                message,
                errors: None,
            },
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed on a storage fault");
                ErrorBody {
                    message: INTERNAL_MESSAGE.to_string(),
                    errors: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rule_is_unprocessable_with_field() {
        let err: ApiError = EngineError::Core(CoreError::EmptyCart).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        match err {
            ApiError::Unprocessable { message, errors } => {
                assert_eq!(message, "Keranjang belanja kosong.");
                assert!(errors.unwrap().contains_key("items"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_resources_are_not_found() {
        let err: ApiError = EngineError::Core(CoreError::SaleNotFound("s-1".to_string())).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = EngineError::Db(DbError::not_found("Product", "p-1")).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Product tidak ditemukan: p-1");
    }

    #[test]
    fn test_storage_fault_is_internal() {
        let err: ApiError = EngineError::Db(DbError::PoolExhausted).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
