//! Error taxonomy of the gift service and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::database::StoreError;

#[derive(Debug, Error)]
pub enum GiftError {
    /// A required field is missing or malformed
    #[error("{0}")]
    Validation(String),

    #[error("Slug \"{0}\" already exists.")]
    Conflict(String),

    #[error("Gift not found")]
    NotFound,

    /// No edit key was presented
    #[error("Authentication required. Edit key missing.")]
    Unauthenticated,

    /// An edit key was presented but does not match
    #[error("Forbidden. Invalid edit key.")]
    Forbidden,

    #[error("{0}")]
    Internal(String),

    #[error("Server configuration error. The service is temporarily unavailable.")]
    Unavailable,
}

pub type GiftResult<T> = Result<T, GiftError>;

impl GiftError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable code placed next to the message in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::NotFound => "not_found",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::Internal(_) => "internal",
            Self::Unavailable => "unavailable",
        }
    }
}

impl IntoResponse for GiftError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (self.status(), body).into_response()
    }
}

impl From<StoreError> for GiftError {
    fn from(err: StoreError) -> Self {
        GiftError::Internal(format!("Record store failure: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(GiftError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(GiftError::Conflict("a".into()).status(), StatusCode::CONFLICT);
        assert_eq!(GiftError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(GiftError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GiftError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            GiftError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GiftError::Unavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
