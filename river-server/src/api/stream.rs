//! Track streaming
//!
//! The artifact is complete on disk before any byte is sent; `ServeFile`
//! handles conditional and range requests.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue},
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use crate::error::ApiResult;
use crate::AppState;

/// GET /songs/:id/:format
pub async fn stream_song(
    State(state): State<AppState>,
    Path((id, format)): Path<(String, String)>,
    request: Request,
) -> ApiResult<Response> {
    let source = state.library.stream(&id, &format).await?;
    debug!(id = %id, format = %source.format, obtained = ?source.obtained, "Streaming");

    let response = ServeFile::new(source.path())
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});

    let (mut parts, body) = response.into_parts();
    if parts.status.is_success() {
        parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(source.format.media_type()),
        );
    }
    Ok(Response::from_parts(parts, Body::new(body)))
}
