//! HTTP surface for the emotion pipeline.

pub mod error;
pub mod handlers;
pub mod types;

pub use error::ApiError;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::audio::AudioLoader;
use crate::config::Config;
use crate::emoji::EmojiMapper;
use crate::emotion::ClassifierService;
use crate::transcription::Transcriber;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<ClassifierService>,
    pub loader: Arc<AudioLoader>,
    pub emojis: Arc<EmojiMapper>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State with the default emoji mapping and a loader built from `config`
    pub fn new(
        config: Config,
        classifier: Arc<ClassifierService>,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Self {
        Self {
            classifier,
            loader: Arc::new(AudioLoader::new(config.loader_config())),
            emojis: Arc::new(EmojiMapper::default()),
            transcriber,
            config: Arc::new(config),
        }
    }
}

/// Build the router with CORS and upload size limits
pub fn router(state: AppState) -> Router {
    let max_body = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/analyze", post(handlers::analyze))
        .route("/emojis", get(handlers::emojis))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(middleware::map_response(error::json_payload_too_large))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve `router(state)` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Emotion service listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
