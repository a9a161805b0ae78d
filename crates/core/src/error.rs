use serde::Serialize;
use thiserror::Error;

/// Unified API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("launch failed: {message}")]
    LaunchFailed {
        message: String,
        diagnostics: Vec<String>,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::LaunchFailed { .. } => "launch_failed",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::LaunchFailed { .. } => 502,
            Self::Internal(_) => 500,
        }
    }

    /// Structured details attached to the envelope.
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::LaunchFailed { diagnostics, .. } => {
                serde_json::json!({ "diagnostics": diagnostics })
            }
            _ => serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// JSON error envelope: `{ "error": { "code": "…", "message": "…", "details": {} } }`
#[derive(Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl From<&ApiError> for ErrorEnvelope {
    fn from(e: &ApiError) -> Self {
        Self {
            error: ErrorBody {
                code: e.code().to_string(),
                message: e.to_string(),
                details: e.details(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_code_and_message() {
        let err = ApiError::Conflict("job already running".into());
        let env = ErrorEnvelope::from(&err);
        assert_eq!(env.error.code, "conflict");
        assert_eq!(env.error.message, "conflict: job already running");
        assert_eq!(env.error.details, serde_json::json!({}));
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn launch_failure_exposes_diagnostics() {
        let err = ApiError::LaunchFailed {
            message: "ffmpeg exited with code 1".into(),
            diagnostics: vec!["No such file or directory".into()],
        };
        let value = serde_json::to_value(ErrorEnvelope::from(&err)).unwrap();
        assert_eq!(value["error"]["code"], "launch_failed");
        assert_eq!(
            value["error"]["details"]["diagnostics"][0],
            "No such file or directory"
        );
        assert_eq!(err.status_code(), 502);
    }
}
