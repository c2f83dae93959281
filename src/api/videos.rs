use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::{errors::AppError, AppState};

/// `GET /api/videos/search/{title}`
///
/// A segment that cannot be decoded is rejected with 400 before the service
/// is asked.
#[tracing::instrument(name = "VideoService.Handler.FindVideos", skip_all)]
pub async fn find_videos(
    State(state): State<AppState>,
    title: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(title) = title?;
    search(&state, &title).await
}

/// `GET /api/videos/search/`, validated as an empty title.
#[tracing::instrument(name = "VideoService.Handler.FindVideos", skip_all)]
pub async fn find_videos_without_title(
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    search(&state, "").await
}

async fn search(state: &AppState, title: &str) -> Result<Response, AppError> {
    let videos = state.video_service.find_videos(title).await?;

    let body = serde_json::to_vec(&videos)?;

    tracing::debug!(videos = videos.len(), "Found videos by title");

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}
