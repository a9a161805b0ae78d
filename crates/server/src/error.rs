use axum::Json;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use reelcast_core::error::{ApiError, ErrorEnvelope};
use reelcast_scanner::BrowseError;
use reelcast_transcoder::StreamError;

/// Newtype wrapper so we can implement `IntoResponse` in this crate.
pub struct AppError(pub ApiError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let envelope = ErrorEnvelope::from(&self.0);
        (status, Json(envelope)).into_response()
    }
}

/// Error for the browser form flow, rendered as an HTML page.
pub struct PageError(pub ApiError);

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "form request failed");
        }
        (status, Html(crate::page::render_error(status, &self.0))).into_response()
    }
}

impl From<ApiError> for PageError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl From<AppError> for PageError {
    fn from(e: AppError) -> Self {
        Self(e.0)
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl From<BrowseError> for AppError {
    fn from(e: BrowseError) -> Self {
        Self(match e {
            BrowseError::PathTraversal(_) => ApiError::Forbidden(e.to_string()),
            BrowseError::NotFound(path) => ApiError::NotFound(path),
            BrowseError::Io(io) => ApiError::Internal(format!("io error: {io}")),
        })
    }
}

impl From<StreamError> for AppError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Path(browse) => browse.into(),
            StreamError::UnsupportedFile { .. } | StreamError::InvalidDelay(_) => {
                Self(ApiError::BadRequest(e.to_string()))
            }
            StreamError::AlreadyRunning { .. } => Self(ApiError::Conflict(e.to_string())),
            StreamError::Launch {
                ref program,
                ref detail,
                ref diagnostics,
            } => Self(ApiError::LaunchFailed {
                message: format!("{program}: {detail}"),
                diagnostics: diagnostics.clone(),
            }),
            StreamError::Crashed { .. } | StreamError::Io(_) => {
                Self(ApiError::Internal(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcast_core::types::JobState;

    fn status_of(e: impl Into<AppError>) -> u16 {
        e.into().0.status_code()
    }

    #[test]
    fn stream_errors_map_to_statuses() {
        assert_eq!(status_of(BrowseError::PathTraversal("..".into())), 403);
        assert_eq!(status_of(BrowseError::NotFound("x".into())), 404);
        assert_eq!(
            status_of(StreamError::Path(BrowseError::NotFound("x".into()))),
            404
        );
        assert_eq!(
            status_of(StreamError::AlreadyRunning {
                job_id: Default::default(),
                state: JobState::Running,
            }),
            409
        );
        assert_eq!(status_of(StreamError::InvalidDelay(f64::NAN)), 400);
        assert_eq!(
            status_of(StreamError::Launch {
                program: "ffmpeg".into(),
                detail: "spawn: not found".into(),
                diagnostics: Vec::new(),
            }),
            502
        );
    }
}
