use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::state::AppState;

/// Create the application router
///
/// Permissive CORS lets the conferencing page's origin load the audio
/// element cross-origin, which track capture requires.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/video_stream", get(handlers::video_stream))
        .route("/audio_file", get(handlers::audio_file))
        .route("/snapshot", get(handlers::snapshot))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
