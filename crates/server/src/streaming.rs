use std::path::Path as FsPath;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use reelcast_core::error::ApiError;
use reelcast_transcoder::hls;
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const POLL_ATTEMPTS: u32 = 25;

/// Reject anything that is not a bare output file name.
fn validate_filename(filename: &str) -> Result<(), ApiError> {
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(ApiError::BadRequest("invalid filename".into()));
    }
    if !hls::is_output_file(filename) {
        return Err(ApiError::NotFound(format!("not a stream file: {filename}")));
    }
    Ok(())
}

/// Wait up to 5s for ffmpeg to write a file, but only while a job is live.
async fn wait_for_output(state: &AppState, path: &FsPath) -> bool {
    for _ in 0..POLL_ATTEMPTS {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return true;
        }
        if !state.launcher.status().await.state.is_active() {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Serve a playlist, segment or subtitle file from the output directory.
/// GET /stream/{filename}
pub async fn stream_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    validate_filename(&filename)?;

    let path = state.launcher.output_dir().join(&filename);
    if !wait_for_output(&state, &path).await {
        return Err(ApiError::NotFound(format!("stream file not ready: {filename}")).into());
    }

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("file open error: {e}")))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("metadata error: {e}")))?
        .len();
    debug!(file = %filename, bytes = len, "serving stream file");

    let body = Body::from_stream(tokio_util::io::ReaderStream::new(file));
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, hls::content_type(&filename).to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        body,
    )
        .into_response();

    // Playlists grow while ffmpeg runs.
    if filename.ends_with(".m3u8") {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-cache"),
        );
    }
    Ok(response)
}
