use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use percent_encoding::utf8_percent_encode;
use reelcast_core::error::ApiError;
use reelcast_core::types::{EntryKind, JobState};
use reelcast_scanner::extensions::{is_subtitle_file, is_video_file};
use reelcast_scanner::resolve::{normalize_display, parent_of};
use reelcast_scanner::{Listing, MediaRoot};
use reelcast_transcoder::launcher::{
    DEFAULT_SUBTITLE_DELAY_SECS, StreamJob, StreamRequest, StreamStatus,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{AppError, PageError};
use crate::page;
use crate::session::{self, Selection};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(browse_page))
        .route("/select", get(select_file))
        .route("/start", post(start_from_form))
        .route("/stop", post(stop_from_form))
        .nest("/api/v1", api_router())
        .nest("/stream", stream_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn stream_router() -> Router<AppState> {
    // Players on other origins fetch playlists and segments.
    Router::new()
        .route("/{filename}", get(crate::streaming::stream_file))
        .layer(CorsLayer::permissive())
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/browse", get(browse_api))
        .route("/stream", post(start_stream).get(stream_status))
        .route("/stream/stop", post(stop_stream))
        .route("/stream/acknowledge", post(acknowledge_stream))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    stream: JobState,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        stream: state.launcher.status().await.state,
    })
}

// ---------------------------------------------------------------------------
// Browsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct BrowseQuery {
    #[serde(default)]
    path: String,
}

/// Directory listing off the async runtime; network mounts can be slow.
async fn list_dir(root: &MediaRoot, path: String) -> Result<Listing, AppError> {
    let root = root.clone();
    let listing = tokio::task::spawn_blocking(move || reelcast_scanner::list(&root, &path))
        .await
        .map_err(|e| ApiError::Internal(format!("listing task failed: {e}")))??;
    Ok(listing)
}

async fn browse_api(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Listing>, AppError> {
    Ok(Json(list_dir(state.media_root(), query.path).await?))
}

async fn browse_page(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
    jar: CookieJar,
) -> Result<Html<String>, AppError> {
    let listing = list_dir(state.media_root(), query.path).await?;
    let selection = session::read(&jar, &state.session_secret);
    let status = state.launcher.status().await;
    Ok(Html(page::render_browse(&listing, &selection, &status)))
}

// ---------------------------------------------------------------------------
// Selection (HTML flow)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SelectQuery {
    #[serde(rename = "type")]
    kind: String,
    path: String,
}

fn folder_href(rel_path: &str) -> String {
    match parent_of(rel_path) {
        Some(parent) if !parent.is_empty() => format!(
            "/?path={}",
            utf8_percent_encode(&parent, page::QUERY_COMPONENT)
        ),
        _ => "/".to_string(),
    }
}

async fn select_file(
    State(state): State<AppState>,
    Query(query): Query<SelectQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), PageError> {
    select_into_session(&state, query, jar)
        .await
        .map_err(PageError::from)
}

async fn select_into_session(
    state: &AppState,
    query: SelectQuery,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let kind = match query.kind.as_str() {
        "video" => EntryKind::Video,
        "subtitle" => EntryKind::Subtitle,
        other => return Err(ApiError::BadRequest(format!("unknown selection type: {other}")).into()),
    };

    let rel_path = normalize_display(&query.path)?;
    state.media_root().resolve_file(&rel_path)?;

    let allowed = match kind {
        EntryKind::Video => is_video_file(&rel_path),
        _ => is_subtitle_file(&rel_path),
    };
    if !allowed {
        return Err(ApiError::BadRequest(format!("not a {kind} file: {rel_path}")).into());
    }

    let mut selection = session::read(&jar, &state.session_secret);
    match kind {
        EntryKind::Video => selection.video = Some(rel_path.clone()),
        _ => selection.subtitle = Some(rel_path.clone()),
    }
    let jar = session::write(jar, &selection, &state.session_secret)?;
    info!(%kind, path = %rel_path, "selection updated");

    Ok((jar, Redirect::to(&folder_href(&rel_path))))
}

#[derive(Deserialize)]
struct StartForm {
    #[serde(default)]
    delay: String,
    #[serde(default)]
    force: Option<String>,
}

fn parse_delay(raw: &str) -> Result<f64, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_SUBTITLE_DELAY_SECS);
    }
    match raw.parse::<f64>() {
        Ok(d) if d.is_finite() => Ok(d),
        _ => Err(ApiError::BadRequest(format!("invalid delay: {raw}"))),
    }
}

/// The submitted delay is stored before launching, so the cookie goes back
/// on failures too.
async fn start_from_form(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<StartForm>,
) -> Result<(CookieJar, Redirect), (CookieJar, PageError)> {
    let delay = match parse_delay(&form.delay) {
        Ok(d) => d,
        Err(e) => return Err((jar, e.into())),
    };
    let force = form
        .force
        .as_deref()
        .is_some_and(|v| matches!(v, "true" | "on" | "1"));

    let selection = Selection {
        delay: Some(delay),
        ..session::read(&jar, &state.session_secret)
    };
    let jar = match session::write(jar.clone(), &selection, &state.session_secret) {
        Ok(updated) => updated,
        Err(e) => return Err((jar, e.into())),
    };

    match launch_selection(&state, &selection, delay, force).await {
        Ok(href) => Ok((jar, Redirect::to(&href))),
        Err(e) => Err((jar, e.into())),
    }
}

async fn launch_selection(
    state: &AppState,
    selection: &Selection,
    delay: f64,
    force: bool,
) -> Result<String, AppError> {
    let Some(video) = selection.video.clone() else {
        return Err(ApiError::BadRequest("no video selected".into()).into());
    };
    let href = folder_href(&video);
    let request = StreamRequest {
        video_path: video,
        subtitle_path: selection.subtitle.clone(),
        subtitle_delay_seconds: delay,
    };
    state.launcher.launch(request, force).await?;
    Ok(href)
}

async fn stop_from_form(State(state): State<AppState>) -> Redirect {
    state.launcher.stop().await;
    Redirect::to("/")
}

// ---------------------------------------------------------------------------
// Stream control (JSON)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct StartStreamBody {
    #[serde(flatten)]
    request: StreamRequest,
    #[serde(default)]
    force: bool,
}

async fn start_stream(
    State(state): State<AppState>,
    Json(body): Json<StartStreamBody>,
) -> Result<(StatusCode, Json<StreamJob>), AppError> {
    let job = state.launcher.launch(body.request, body.force).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn stream_status(State(state): State<AppState>) -> Json<StreamStatus> {
    Json(state.launcher.status().await)
}

async fn stop_stream(State(state): State<AppState>) -> Json<StreamStatus> {
    Json(state.launcher.stop().await)
}

async fn acknowledge_stream(State(state): State<AppState>) -> Json<StreamStatus> {
    Json(state.launcher.acknowledge().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_parsing() {
        assert_eq!(parse_delay("").unwrap(), 1.5);
        assert_eq!(parse_delay(" -2.5 ").unwrap(), -2.5);
        assert_eq!(parse_delay("0").unwrap(), 0.0);
        assert!(parse_delay("soon").is_err());
        assert!(parse_delay("inf").is_err());
    }

    #[test]
    fn redirects_back_to_folder() {
        assert_eq!(folder_href("movie.mkv"), "/");
        assert_eq!(folder_href("My Show/s01/ep1.mkv"), "/?path=My%20Show/s01");
    }
}
