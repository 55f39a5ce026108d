//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Initializes the record store and the blob store
//! - Starts the HTTP server with graceful shutdown support

use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use giftpage::blob::S3BlobStore;
use giftpage::config::{BlobConfig, Config};
use giftpage::database::{init_db, GiftStore};
use giftpage::rewrite::{GeminiRewriter, MessageRewriter};
use giftpage::route::{create_app, create_unavailable_app, AppState};
use giftpage::service::GiftService;

/// Application entry point
///
/// # Environment Variables
///
/// - `PORT` - Server port number (default: 8080)
/// - `DATABASE_URL` - Path to the redb file (default: "gifts.db")
/// - `BLOB_*` - Object store connection (see `config.rs`)
/// - `GEMINI_API_KEY` - Enables `/api/rewrite-message`
///
/// When a `BLOB_*` variable is missing the server still starts, but answers
/// every request with 503 until it is restarted with a complete config.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("giftpage=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;

    let app = match BlobConfig::from_env() {
        Ok(blob_config) => {
            let db = init_db(&config.database_url)?;
            info!("Using database: {}", config.database_url);

            let store = GiftStore::new(Arc::new(db));
            let blobs = Arc::new(S3BlobStore::new(&blob_config, config.upload_ttl));

            let rewriter = match &config.gemini_api_key {
                Some(api_key) => Some(Arc::new(GeminiRewriter::new(
                    api_key.clone(),
                    config.gemini_model.clone(),
                )) as Arc<dyn MessageRewriter>),
                None => {
                    warn!("GEMINI_API_KEY not set, /api/rewrite-message is disabled");
                    None
                }
            };

            create_app(AppState {
                gifts: GiftService::new(store, blobs),
                rewriter,
            })
        }
        Err(err) => {
            error!("Blob store is not configured ({err}); serving 503 for every request");
            create_unavailable_app()
        }
    };

    let app = app.layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.addr()).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    // Keep serving until SIGTERM or SIGINT, letting open requests finish
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Handles graceful shutdown signals
///
/// Returns when SIGINT (Ctrl+C) or, on Unix, SIGTERM is received. Requests
/// already in flight complete, so no record write is cut off half-way.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    // On non-Unix systems (Windows), only handle Ctrl+C
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server.");
}
