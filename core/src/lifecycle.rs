//! Lifecycle controller
//!
//! The agent may not terminate on its own authority. A user close action
//! submits a request to the server, a single polling task waits for the
//! verdict, and only an approved verdict reaches `running = false`. An
//! exit that happens without approval is undone by the [`ExitGuard`],
//! which relaunches the binary through an injected [`ProcessSupervisor`].

use crate::remote::{RemoteAuthority, RemoteError};
use crate::state::{CloseRequest, RequestStatus, SharedState};
use anyhow::Context;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Outcome of a user-initiated close attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseAttempt {
    /// A fresh request was submitted to the server.
    Submitted { request_id: String },
    /// A request is already outstanding; the attempt re-attached to it
    /// without a second network call.
    AlreadyPending { request_id: String },
}

impl CloseAttempt {
    pub fn request_id(&self) -> &str {
        match self {
            CloseAttempt::Submitted { request_id } => request_id,
            CloseAttempt::AlreadyPending { request_id } => request_id,
        }
    }
}

/// Owns the close-request state machine and the approval polling task.
pub struct LifecycleController {
    state: SharedState,
    remote: Arc<dyn RemoteAuthority>,
    poll_interval: Duration,
    /// Serializes close attempts end to end: concurrent callers queue
    /// here, so exactly one submission reaches the server per outstanding
    /// request and every caller observes the same id.
    submit_gate: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl LifecycleController {
    pub fn new(state: SharedState, remote: Arc<dyn RemoteAuthority>, poll_interval: Duration) -> Self {
        Self {
            state,
            remote,
            poll_interval,
            submit_gate: tokio::sync::Mutex::new(None),
        }
    }

    /// The single close-attempt entry point. Idempotent while a request
    /// is outstanding; after a denial a new attempt submits a fresh
    /// request. On submission failure the state stays untouched and the
    /// caller may retry.
    pub async fn request_close(&self) -> Result<CloseAttempt, RemoteError> {
        let mut poller_slot = self.submit_gate.lock().await;

        if let Some(request) = self.state.pending_request() {
            info!(request_id = %request.id, "close request already pending");
            return Ok(CloseAttempt::AlreadyPending {
                request_id: request.id,
            });
        }

        let receipt = self.remote.submit_close_request().await?;
        info!(
            request_id = %receipt.request_id,
            "close request submitted, waiting for admin approval"
        );
        self.state
            .set_pending(CloseRequest::pending(receipt.request_id.clone()));

        // A previous poller can only be moments from finishing here: it
        // outlives its own request by a few instructions, and a pending
        // request would have returned AlreadyPending above. Wait it out
        // so two polling loops never overlap.
        if let Some(previous) = poller_slot.take() {
            if !previous.is_finished() {
                let _ = previous.await;
            }
        }
        *poller_slot = Some(tokio::spawn(poll_until_resolved(
            self.state.clone(),
            Arc::clone(&self.remote),
            receipt.request_id.clone(),
            self.poll_interval,
        )));

        Ok(CloseAttempt::Submitted {
            request_id: receipt.request_id,
        })
    }
}

/// Poll the server until the tracked request resolves or the agent stops.
/// A failed poll is logged and retried on the next cycle; there is no
/// attempt limit and no backoff. The wait for an admin decision is
/// unbounded on purpose.
async fn poll_until_resolved(
    state: SharedState,
    remote: Arc<dyn RemoteAuthority>,
    request_id: String,
    interval: Duration,
) {
    loop {
        if !state.is_running() {
            break;
        }
        match state.pending_request() {
            Some(request) if request.id == request_id => {}
            // Resolved or externally cleared
            _ => break,
        }

        match remote.check_permission(&request_id).await {
            Ok(verdict) => match verdict.status {
                RequestStatus::Approved => {
                    if state.approve_close(&request_id) {
                        info!(%request_id, "close request approved, shutting down");
                    }
                    break;
                }
                RequestStatus::Denied => {
                    if let Some(reason) = state.deny_close(&request_id, verdict.reason) {
                        warn!(%request_id, %reason, "close request denied");
                    }
                    break;
                }
                RequestStatus::Pending => {
                    debug!(%request_id, "close request still pending");
                }
            },
            Err(e) => {
                warn!(%request_id, "permission poll failed: {e}");
            }
        }

        sleep(interval).await;
    }
}

/// Relaunches the agent process. Injected into the exit guard so tests
/// substitute a recorder.
pub trait ProcessSupervisor: Send + Sync {
    fn relaunch(&self) -> anyhow::Result<()>;
}

/// Spawns a fresh detached instance of the current binary with the same
/// arguments and working directory.
pub struct DetachedRelauncher;

impl ProcessSupervisor for DetachedRelauncher {
    fn relaunch(&self) -> anyhow::Result<()> {
        let binary = std::env::current_exe().context("could not resolve agent binary path")?;
        let args: Vec<String> = std::env::args().skip(1).collect();

        let child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn replacement agent")?;

        info!(pid = child.id(), "replacement agent launched");
        Ok(())
    }
}

/// Guards every exit path. An exit with `close_approved == false` is
/// unsanctioned: the guard launches a replacement instance before the
/// process finishes tearing down. The one sanctioned path, exit after an
/// approved close, passes through untouched.
pub struct ExitGuard {
    state: SharedState,
    supervisor: Arc<dyn ProcessSupervisor>,
    marker: PathBuf,
    fired: AtomicBool,
}

impl ExitGuard {
    pub fn new(state: SharedState, supervisor: Arc<dyn ProcessSupervisor>, marker: PathBuf) -> Self {
        Self {
            state,
            supervisor,
            marker,
            fired: AtomicBool::new(false),
        }
    }

    /// Marker location under the user data directory, falling back to
    /// the system temp directory.
    pub fn default_marker_path() -> PathBuf {
        let dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("vigil");
        let _ = std::fs::create_dir_all(&dir);
        dir.join("relaunch.marker")
    }

    /// Remove a marker a previous incarnation may have left behind.
    /// Called once at startup.
    pub fn clear_marker(&self) {
        let _ = std::fs::remove_file(&self.marker);
    }

    /// Invoked on every exit path (signal handlers, end of main). Safe to
    /// call multiple times; never panics during teardown.
    pub fn on_exit(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.state.close_approved() {
            debug!("sanctioned shutdown, guard stands down");
            return;
        }

        // The marker suppresses duplicate relaunches when several exit
        // triggers fire in one teardown (e.g. one per signal).
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.marker)
        {
            Ok(mut file) => {
                let _ = writeln!(
                    file,
                    "{} pid={}",
                    Local::now().to_rfc3339(),
                    std::process::id()
                );
            }
            Err(_) => {
                debug!("relaunch marker already present, skipping");
                return;
            }
        }

        if let Err(e) = self.supervisor.relaunch() {
            // Swallowed: the guard must never raise while the process is
            // going down.
            warn!("relaunch failed: {e:#}");
        }
    }
}
