//! # Engine Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CoreError  business rule / validation   → caller's fault, 422          │
//! │  DbError    storage                      → NotFound 404, else 500       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A unique violation that stands for a business rule (a second pending
//! refund for the same sale) is rewritten into its CoreError where the
//! engine knows what it means.

use thiserror::Error;

use kasir_core::{CoreError, FieldErrors};
use kasir_db::DbError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl EngineError {
    /// True for rejections of the request itself (nothing went wrong
    /// server-side).
    pub fn is_rejection(&self) -> bool {
        matches!(self, EngineError::Core(_))
    }

    pub fn field_errors(&self) -> Option<FieldErrors> {
        match self {
            EngineError::Core(e) => e.field_errors(),
            EngineError::Db(_) => None,
        }
    }
}

impl From<kasir_core::ValidationError> for EngineError {
    fn from(err: kasir_core::ValidationError) -> Self {
        EngineError::Core(err.into())
    }
}

/// `commit()` / `rollback()` on a transaction return sqlx errors directly.
impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Db(err.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
