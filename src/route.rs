//! Route definitions for the gift API
//!
//! This module configures all HTTP routes and maps them to their respective
//! handlers. It also defines the state those handlers share.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::handler::{
    create_gift, create_upload_url, delete_gift, get_gift, list_summaries, rewrite_message,
    update_gift,
};
use crate::middleware::{cors_layer, service_unavailable};
use crate::rewrite::MessageRewriter;
use crate::service::GiftService;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub gifts: GiftService,

    /// Text-assist backend; `None` when no API key is configured
    pub rewriter: Option<Arc<dyn MessageRewriter>>,
}

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `POST   /api/gift` - Creates a gift, returns its slug and edit key
/// - `GET    /api/gift/{slug}` - Reads a gift (public)
/// - `PUT    /api/gift/{slug}` - Updates a gift (requires `X-Edit-Key`)
/// - `DELETE /api/gift/{slug}` - Deletes a gift and its images (requires `X-Edit-Key`)
/// - `POST   /api/gifts/list` - Summaries for a list of slugs
/// - `POST   /api/upload-url` - Presigned direct-upload URL for one image
/// - `POST   /api/rewrite-message` - Text-assist rewrite of a message
///
/// # Example Usage
///
/// ```no_run
/// # use std::sync::Arc;
/// # use giftpage::blob::MemoryBlobStore;
/// # use giftpage::database::{init_db, GiftStore};
/// # use giftpage::route::{create_app, AppState};
/// # use giftpage::service::GiftService;
/// # let db = init_db("gifts.db").unwrap();
/// let store = GiftStore::new(Arc::new(db));
/// let blobs = Arc::new(MemoryBlobStore::new("https://cdn.example.com"));
/// let state = AppState { gifts: GiftService::new(store, blobs), rewriter: None };
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/gift", post(create_gift))
        .route(
            "/gift/{slug}",
            get(get_gift).put(update_gift).delete(delete_gift),
        )
        .route("/gifts/list", post(list_summaries))
        .route("/upload-url", post(create_upload_url))
        .route("/rewrite-message", post(rewrite_message));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(cors_layer())
}

/// Router used when required configuration is missing
///
/// Answers every request with 503 (CORS preflights still succeed so browsers
/// can read the error).
pub fn create_unavailable_app() -> Router {
    Router::new()
        .fallback(service_unavailable)
        .layer(cors_layer())
}
