//! river-server library - personal audio library server
//!
//! Indexes a directory of audio files, lists them over HTTP, and streams
//! each track in a requested format, transcoding on demand into a cache.

use axum::Router;
use chrono::{DateTime, Utc};
use services::Library;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<Library>,
    /// Server password; `None` disables authentication
    pub password: Option<Arc<str>>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state; an empty password disables auth
    pub fn new(library: Arc<Library>, password: &str) -> Self {
        Self {
            library,
            password: (!password.is_empty()).then(|| Arc::from(password)),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/songs", get(api::list_songs).put(api::reload_songs))
        .route("/songs/:id", get(api::get_song))
        .route("/songs/:id/:format", get(api::stream_song))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
