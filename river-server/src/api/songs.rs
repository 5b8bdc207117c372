//! Track listing and lookup

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiResult;
use crate::models::Track;
use crate::AppState;

/// GET /songs
///
/// Every indexed track in listing order.
pub async fn list_songs(State(state): State<AppState>) -> Json<Vec<Arc<Track>>> {
    Json(state.library.index().await.list().to_vec())
}

/// PUT /songs
///
/// Reconciles the index with the library, then returns the new listing.
pub async fn reload_songs(State(state): State<AppState>) -> ApiResult<Json<Vec<Arc<Track>>>> {
    let summary = state.library.reload().await?;
    info!(
        tracks = summary.tracks,
        added = summary.stats.added,
        updated = summary.stats.updated,
        removed = summary.stats.removed,
        artifacts_removed = summary.artifacts_removed,
        persisted = summary.persisted,
        "Reload requested over HTTP"
    );
    Ok(Json(state.library.index().await.list().to_vec()))
}

/// GET /songs/:id
pub async fn get_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Arc<Track>>> {
    Ok(Json(state.library.track(&id).await?))
}
