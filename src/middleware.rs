use axum::{
    http::{header, HeaderName, Method},
    response::{IntoResponse, Response},
};
use tower_http::cors::{Any, CorsLayer};

use crate::error::GiftError;
use crate::handler::EDIT_KEY_HEADER;

/// CORS policy shared by every route
///
/// The browser client is served from a different origin than the API, so
/// any origin may call it. Preflight `OPTIONS` requests are answered here and
/// never reach a handler.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(EDIT_KEY_HEADER),
        ])
}

/// Fallback used when the blob store is not configured
///
/// Every request is answered with 503 before any business logic runs, so a
/// half-configured deployment cannot create records whose images it could
/// never clean up.
pub async fn service_unavailable() -> Response {
    GiftError::Unavailable.into_response()
}
