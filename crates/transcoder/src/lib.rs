#![allow(clippy::collapsible_if)]
pub mod args;
pub mod hls;
pub mod launcher;
pub mod supervisor;

use std::path::PathBuf;
use std::time::Duration;

use reelcast_core::types::JobState;
use reelcast_scanner::BrowseError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error(transparent)]
    Path(#[from] BrowseError),
    #[error("not a supported {kind} file: {path}")]
    UnsupportedFile { kind: &'static str, path: String },
    #[error("subtitle delay must be a finite number of seconds, got {0}")]
    InvalidDelay(f64),
    #[error("a stream job is already {state} (job {job_id}); stop it or force a restart")]
    AlreadyRunning { job_id: Uuid, state: JobState },
    #[error("failed to launch {program}: {detail}")]
    Launch {
        program: String,
        detail: String,
        diagnostics: Vec<String>,
    },
    #[error("stream job crashed ({})", describe_exit(.exit_code))]
    Crashed { exit_code: Option<i32> },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "terminated by signal".to_string(),
    }
}

/// Stream output and process settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub ffmpeg_path: PathBuf,
    pub output_dir: PathBuf,
    pub segment_secs: u32,
    /// Time between SIGTERM and SIGKILL when stopping.
    pub grace_period: Duration,
    /// A process exiting with an error inside this window is a launch failure.
    pub startup_probe: Duration,
    pub diagnostic_lines: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            output_dir: std::env::temp_dir().join("reelcast_stream"),
            segment_secs: 10,
            grace_period: Duration::from_secs(5),
            startup_probe: Duration::from_millis(750),
            diagnostic_lines: 40,
        }
    }
}
