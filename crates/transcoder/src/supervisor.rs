//! Single-job process supervisor.
//!
//! State machine: `Idle -> Starting -> Running -> (Stopped | Crashed)`,
//! back to `Idle` on acknowledge or on the next start. At most one process
//! exists at a time. Start, stop and acknowledge are serialized by an
//! operation lock; the state itself sits behind a second lock that is only
//! held for short updates, so status queries never wait on a stop.
//!
//! The child is owned by a monitor task. Stopping sends SIGTERM, waits for
//! the grace period, then kills.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reelcast_core::types::JobState;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{StreamConfig, StreamError, describe_exit};

/// How long to wait for stderr to drain after the process exited.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What to run.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// A started job. `meta` is whatever the caller attached to it.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo<M> {
    pub id: Uuid,
    pub pid: Option<u32>,
    pub program: String,
    pub started_at: DateTime<Utc>,
    pub meta: M,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus<M> {
    pub state: JobState,
    pub job: Option<JobInfo<M>>,
    pub exit_code: Option<i32>,
    /// Last stderr lines of the current or last job.
    pub diagnostics: Vec<String>,
    pub error: Option<String>,
}

/// A state change, broadcast to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub job_id: Uuid,
    pub state: JobState,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub grace_period: Duration,
    pub startup_probe: Duration,
    pub diagnostic_lines: usize,
}

impl From<&StreamConfig> for SupervisorConfig {
    fn from(c: &StreamConfig) -> Self {
        Self {
            grace_period: c.grace_period,
            startup_probe: c.startup_probe,
            diagnostic_lines: c.diagnostic_lines,
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&StreamConfig::default())
    }
}

struct Inner<M> {
    state: JobState,
    job: Option<JobInfo<M>>,
    exit_code: Option<i32>,
    diagnostics: Vec<String>,
    control: Option<JobControl>,
}

impl<M> Inner<M> {
    fn reset(&mut self) {
        self.state = JobState::Idle;
        self.job = None;
        self.exit_code = None;
        self.diagnostics.clear();
        self.control = None;
    }
}

/// Handle to the monitor task of a running job.
struct JobControl {
    id: Uuid,
    stop_tx: Option<oneshot::Sender<()>>,
    done_rx: watch::Receiver<bool>,
    tail: DiagnosticTail,
}

fn transition<M>(
    inner: &mut Inner<M>,
    transitions: &broadcast::Sender<Transition>,
    job_id: Uuid,
    state: JobState,
) {
    debug!(%job_id, from = %inner.state, to = %state, "job state transition");
    inner.state = state;
    // No subscribers is fine.
    let _ = transitions.send(Transition { job_id, state });
}

pub struct ProcessSupervisor<M> {
    config: SupervisorConfig,
    op_lock: Mutex<()>,
    inner: Arc<Mutex<Inner<M>>>,
    transitions: broadcast::Sender<Transition>,
}

impl<M> ProcessSupervisor<M>
where
    M: Clone + Send + Sync + 'static,
{
    pub fn new(config: SupervisorConfig) -> Self {
        let (transitions, _) = broadcast::channel(64);
        Self {
            config,
            op_lock: Mutex::new(()),
            inner: Arc::new(Mutex::new(Inner {
                state: JobState::Idle,
                job: None,
                exit_code: None,
                diagnostics: Vec::new(),
                control: None,
            })),
            transitions,
        }
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Start a process. With `force`, a running job is stopped first;
    /// without it a running job is an `AlreadyRunning` error.
    pub async fn start(
        &self,
        spec: ProcessSpec,
        meta: M,
        force: bool,
    ) -> Result<JobInfo<M>, StreamError> {
        let _op = self.op_lock.lock().await;

        {
            let inner = self.inner.lock().await;
            if inner.state.is_active() && !force {
                return Err(StreamError::AlreadyRunning {
                    job_id: inner.job.as_ref().map(|j| j.id).unwrap_or_default(),
                    state: inner.state,
                });
            }
        }

        if force {
            self.stop_locked().await;
        }

        let id = Uuid::new_v4();
        {
            let mut inner = self.inner.lock().await;
            inner.reset();
            transition(&mut inner, &self.transitions, id, JobState::Starting);
        }

        match self.spawn(id, spec, meta).await {
            Ok(job) => Ok(job),
            Err(e) => {
                let mut inner = self.inner.lock().await;
                inner.reset();
                transition(&mut inner, &self.transitions, id, JobState::Idle);
                Err(e)
            }
        }
    }

    async fn spawn(&self, id: Uuid, spec: ProcessSpec, meta: M) -> Result<JobInfo<M>, StreamError> {
        let program = spec.program.to_string_lossy().into_owned();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| StreamError::Launch {
            program: program.clone(),
            detail: format!("spawn: {e}"),
            diagnostics: Vec::new(),
        })?;

        let tail = DiagnosticTail::new(self.config.diagnostic_lines);
        let reader = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(tail.clone().collect(stderr)));

        let job = JobInfo {
            id,
            pid: child.id(),
            program: program.clone(),
            started_at: Utc::now(),
            meta,
        };
        info!(job_id = %id, pid = ?job.pid, %program, args = ?spec.args, "spawned process");

        // A process that dies right away failed to launch.
        match tokio::time::timeout(self.config.startup_probe, child.wait()).await {
            Err(_) => {}
            Ok(Ok(status)) if status.success() => {
                let diagnostics = finish_reader(reader, &tail).await;
                info!(job_id = %id, "process finished during startup");
                let mut inner = self.inner.lock().await;
                inner.job = Some(job.clone());
                inner.exit_code = status.code();
                inner.diagnostics = diagnostics;
                transition(&mut inner, &self.transitions, id, JobState::Running);
                transition(&mut inner, &self.transitions, id, JobState::Stopped);
                return Ok(job);
            }
            Ok(Ok(status)) => {
                let diagnostics = finish_reader(reader, &tail).await;
                warn!(job_id = %id, code = ?status.code(), "process exited during startup");
                return Err(StreamError::Launch {
                    program,
                    detail: format!("exited during startup ({})", describe_exit(&status.code())),
                    diagnostics,
                });
            }
            Ok(Err(e)) => {
                return Err(StreamError::Launch {
                    program,
                    detail: format!("wait: {e}"),
                    diagnostics: tail.snapshot().await,
                });
            }
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = watch::channel(false);
        {
            let mut inner = self.inner.lock().await;
            inner.job = Some(job.clone());
            inner.control = Some(JobControl {
                id,
                stop_tx: Some(stop_tx),
                done_rx,
                tail: tail.clone(),
            });
            transition(&mut inner, &self.transitions, id, JobState::Running);
        }

        let monitor = Monitor {
            inner: self.inner.clone(),
            transitions: self.transitions.clone(),
            id,
            grace: self.config.grace_period,
        };
        tokio::spawn(monitor.run(child, stop_rx, done_tx, reader, tail));

        Ok(job)
    }

    /// Stop the running job, if any. Idempotent.
    pub async fn stop(&self) -> SupervisorStatus<M> {
        let _op = self.op_lock.lock().await;
        self.stop_locked().await;
        self.status().await
    }

    /// Caller must hold `op_lock`.
    async fn stop_locked(&self) {
        let (stop_tx, mut done_rx) = {
            let mut inner = self.inner.lock().await;
            match inner.control.as_mut() {
                Some(control) => (control.stop_tx.take(), control.done_rx.clone()),
                None => return,
            }
        };

        if let Some(tx) = stop_tx {
            info!("stopping stream process");
            let _ = tx.send(());
        }

        // Err only if the monitor went away without reporting.
        let _ = done_rx.wait_for(|done| *done).await;
    }

    /// Move a stopped or crashed job back to `Idle`.
    pub async fn acknowledge(&self) -> SupervisorStatus<M> {
        let _op = self.op_lock.lock().await;
        {
            let mut inner = self.inner.lock().await;
            if inner.state.is_terminated() {
                let id = inner.job.as_ref().map(|j| j.id).unwrap_or_default();
                inner.reset();
                transition(&mut inner, &self.transitions, id, JobState::Idle);
            }
        }
        self.status().await
    }

    pub async fn status(&self) -> SupervisorStatus<M> {
        let inner = self.inner.lock().await;
        let diagnostics = match &inner.control {
            Some(control) => control.tail.snapshot().await,
            None => inner.diagnostics.clone(),
        };
        SupervisorStatus {
            state: inner.state,
            job: inner.job.clone(),
            exit_code: inner.exit_code,
            diagnostics,
            error: (inner.state == JobState::Crashed).then(|| {
                StreamError::Crashed {
                    exit_code: inner.exit_code,
                }
                .to_string()
            }),
        }
    }

    /// The job currently starting or running.
    pub async fn active_job(&self) -> Option<(JobInfo<M>, JobState)> {
        let inner = self.inner.lock().await;
        if !inner.state.is_active() {
            return None;
        }
        inner.job.clone().map(|job| (job, inner.state))
    }
}

struct Monitor<M> {
    inner: Arc<Mutex<Inner<M>>>,
    transitions: broadcast::Sender<Transition>,
    id: Uuid,
    grace: Duration,
}

impl<M: Send + 'static> Monitor<M> {
    async fn run(
        self,
        mut child: Child,
        stop_rx: oneshot::Receiver<()>,
        done_tx: watch::Sender<bool>,
        reader: Option<JoinHandle<()>>,
        tail: DiagnosticTail,
    ) {
        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = stop_rx => None,
        };
        let requested = exited.is_none();
        let status = match exited {
            Some(status) => status,
            None => terminate(&mut child, self.grace).await,
        };
        let diagnostics = finish_reader(reader, &tail).await;

        let mut inner = self.inner.lock().await;
        if inner.control.as_ref().is_some_and(|c| c.id == self.id) {
            inner.control = None;
            inner.diagnostics = diagnostics;

            let crashed = match &status {
                Ok(s) => {
                    inner.exit_code = s.code();
                    !requested && !s.success()
                }
                Err(e) => {
                    warn!(job_id = %self.id, error = %e, "failed to wait for process");
                    !requested
                }
            };

            if crashed {
                warn!(job_id = %self.id, exit_code = ?inner.exit_code, "stream process crashed");
                transition(&mut inner, &self.transitions, self.id, JobState::Crashed);
            } else {
                info!(job_id = %self.id, exit_code = ?inner.exit_code, requested, "stream process ended");
                transition(&mut inner, &self.transitions, self.id, JobState::Stopped);
            }
        }
        drop(inner);

        let _ = done_tx.send(true);
    }
}

async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    signal_graceful(child);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!(pid = ?child.id(), grace_secs = grace.as_secs_f64(), "process ignored SIGTERM, killing");
            child.kill().await?;
            child.wait().await
        }
    }
}

#[cfg(unix)]
fn signal_graceful(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    // None once the child has been reaped.
    let Some(pid) = child.id() else { return };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!(pid, error = %e, "failed to send SIGTERM");
    }
}

#[cfg(not(unix))]
fn signal_graceful(child: &mut Child) {
    let _ = child.start_kill();
}

async fn finish_reader(reader: Option<JoinHandle<()>>, tail: &DiagnosticTail) -> Vec<String> {
    if let Some(handle) = reader {
        if tokio::time::timeout(STDERR_DRAIN_TIMEOUT, handle).await.is_err() {
            debug!("stderr still open after process exit");
        }
    }
    tail.snapshot().await
}

/// Ring buffer of the last stderr lines.
#[derive(Clone)]
struct DiagnosticTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    cap: usize,
}

impl DiagnosticTail {
    fn new(cap: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(cap))),
            cap,
        }
    }

    async fn collect<R: AsyncRead + Unpin>(self, stream: R) {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    debug!(target: "reelcast::ffmpeg", "{line}");
                    self.push(line).await;
                }
                Err(e) => {
                    debug!(error = %e, "stderr read failed");
                    break;
                }
            }
        }
    }

    async fn push(&self, line: String) {
        if self.cap == 0 {
            return;
        }
        let mut lines = self.lines.lock().await;
        if lines.len() == self.cap {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    async fn snapshot(&self) -> Vec<String> {
        self.lines.lock().await.iter().cloned().collect()
    }
}
