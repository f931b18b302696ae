//! Request extractors whose rejections use the API's error body.

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use kasir_core::ValidationError;

use crate::error::ApiError;

/// Header naming the acting user. Identity only; nothing is authenticated.
pub const USER_HEADER: &str = "x-user-id";

/// The user performing the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match user_id {
            Some(id) => Ok(Actor(id.to_string())),
            None => Err(ValidationError::Required {
                field: "X-User-Id".to_string(),
            }
            .into()),
        }
    }
}

/// `Json` with a 422 `{message}` body on malformed input.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` with a 422 `{message}` body on malformed parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
