use std::io::Read;
use std::path::{Path, PathBuf};

use reelcast_core::types::EntryKind;
use reelcast_scanner::MediaRoot;
use reelcast_scanner::extensions::{is_subtitle_file, is_video_file};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::args::{StreamInputs, build_ffmpeg_args};
use crate::hls::{self, MASTER_PLAYLIST};
use crate::supervisor::{
    JobInfo, ProcessSpec, ProcessSupervisor, SupervisorConfig, SupervisorStatus, Transition,
};
use crate::{StreamConfig, StreamError};

pub const DEFAULT_SUBTITLE_DELAY_SECS: f64 = 1.5;

fn default_delay() -> f64 {
    DEFAULT_SUBTITLE_DELAY_SECS
}

/// A user's selection: paths relative to the media root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub video_path: String,
    #[serde(default)]
    pub subtitle_path: Option<String>,
    #[serde(default = "default_delay")]
    pub subtitle_delay_seconds: f64,
}

/// What a stream job produces.
#[derive(Debug, Clone, Serialize)]
pub struct StreamOutput {
    pub request: StreamRequest,
    pub output_dir: PathBuf,
    pub master_playlist: String,
}

pub type StreamJob = JobInfo<StreamOutput>;
pub type StreamStatus = SupervisorStatus<StreamOutput>;

/// Turns stream requests into a supervised ffmpeg process.
pub struct StreamLauncher {
    config: StreamConfig,
    media_root: MediaRoot,
    supervisor: ProcessSupervisor<StreamOutput>,
    launch_lock: Mutex<()>,
}

impl StreamLauncher {
    pub fn new(config: StreamConfig, media_root: MediaRoot) -> Self {
        let supervisor = ProcessSupervisor::new(SupervisorConfig::from(&config));
        Self {
            config,
            media_root,
            supervisor,
            launch_lock: Mutex::new(()),
        }
    }

    pub fn media_root(&self) -> &MediaRoot {
        &self.media_root
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Resolve the request, prepare the output directory and start ffmpeg.
    pub async fn launch(&self, request: StreamRequest, force: bool) -> Result<StreamJob, StreamError> {
        let _launch = self.launch_lock.lock().await;

        if !request.subtitle_delay_seconds.is_finite() {
            return Err(StreamError::InvalidDelay(request.subtitle_delay_seconds));
        }

        let video = self.resolve_input(&request.video_path, EntryKind::Video)?;
        let subtitle = request
            .subtitle_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| self.resolve_input(p, EntryKind::Subtitle))
            .transpose()?;

        // Leave the output of a running job alone unless it is being replaced.
        if force {
            self.supervisor.stop().await;
        } else if let Some((job, state)) = self.supervisor.active_job().await {
            return Err(StreamError::AlreadyRunning {
                job_id: job.id,
                state,
            });
        }

        let output_dir = self.config.output_dir.clone();
        prepare_output_dir(&output_dir, subtitle.is_some()).await?;

        materialize(&video).await;
        if let Some(sub) = &subtitle {
            materialize(sub).await;
        }

        let inputs = StreamInputs {
            video: &video,
            subtitle: subtitle.as_deref(),
            subtitle_delay_secs: request.subtitle_delay_seconds,
        };
        let args = build_ffmpeg_args(&inputs, &output_dir, self.config.segment_secs);

        let spec = ProcessSpec {
            program: self.config.ffmpeg_path.clone(),
            args,
            cwd: Some(output_dir.clone()),
        };
        let meta = StreamOutput {
            request,
            output_dir,
            master_playlist: MASTER_PLAYLIST.to_string(),
        };

        let job = match self.supervisor.start(spec, meta, force).await {
            Ok(job) => job,
            Err(e) => {
                // No playlist may outlive a failed launch.
                if let Err(io) = clear_output(&self.config.output_dir).await {
                    warn!(dir = %self.config.output_dir.display(), error = %io, "failed to clean stream output");
                }
                return Err(e);
            }
        };
        info!(
            job_id = %job.id,
            video = %job.meta.request.video_path,
            subtitle = ?job.meta.request.subtitle_path,
            delay = job.meta.request.subtitle_delay_seconds,
            "stream launched"
        );
        Ok(job)
    }

    fn resolve_input(&self, rel_path: &str, kind: EntryKind) -> Result<PathBuf, StreamError> {
        let path = self.media_root.resolve_file(rel_path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let allowed = match kind {
            EntryKind::Video => is_video_file(name),
            EntryKind::Subtitle => is_subtitle_file(name),
            _ => false,
        };
        if !allowed {
            return Err(StreamError::UnsupportedFile {
                kind: kind.as_str(),
                path: rel_path.to_string(),
            });
        }
        Ok(path)
    }

    pub async fn status(&self) -> StreamStatus {
        self.supervisor.status().await
    }

    pub async fn stop(&self) -> StreamStatus {
        self.supervisor.stop().await
    }

    pub async fn acknowledge(&self) -> StreamStatus {
        self.supervisor.acknowledge().await
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Transition> {
        self.supervisor.subscribe()
    }

    /// Stop the job and remove everything it wrote.
    pub async fn shutdown(&self) {
        self.supervisor.stop().await;
        if let Err(e) = clear_output(&self.config.output_dir).await {
            warn!(dir = %self.config.output_dir.display(), error = %e, "failed to clean stream output");
        }
        // Only succeeds when nothing else lives there.
        if tokio::fs::remove_dir(&self.config.output_dir).await.is_ok() {
            info!(dir = %self.config.output_dir.display(), "removed stream output directory");
        }
    }
}

async fn prepare_output_dir(dir: &Path, with_subtitles: bool) -> Result<(), StreamError> {
    tokio::fs::create_dir_all(dir).await?;
    clear_output(dir).await?;
    tokio::fs::write(dir.join(MASTER_PLAYLIST), hls::master_playlist(with_subtitles)).await?;
    Ok(())
}

/// Remove playlists and segments left by a previous job. Other files are
/// kept.
async fn clear_output(dir: &Path) -> std::io::Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let mut removed = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if hls::is_output_file(name) && entry.file_type().await?.is_file() {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    debug!(dir = %dir.display(), removed, "cleared stream output");
    Ok(())
}

/// Read one byte so cloud-sync providers fetch a placeholder file before
/// ffmpeg opens it. Failure only warns.
async fn materialize(path: &Path) {
    let owned = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&owned)?;
        let mut byte = [0u8; 1];
        file.read(&mut byte).map(|_| ())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(path = %path.display(), error = %e, "could not read input file"),
        Err(e) => warn!(path = %path.display(), error = %e, "materialize task failed"),
    }
}
