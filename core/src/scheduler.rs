//! Periodic tasks
//!
//! Fixed-interval loops for the life of the process: a cycle runs, a
//! failure is logged and swallowed, then the task sleeps for its full
//! interval (no compensation for the time the cycle took). Loops observe
//! `running == false` on their next wake-up and exit cooperatively, so
//! termination may lag up to one interval behind approval.

use crate::config::Config;
use crate::monitor::ActivityMonitor;
use crate::probe::{ScreenGrabber, WindowInspector};
use crate::remote::{ActivityStatus, RemoteAuthority};
use crate::state::SharedState;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Run `action` every `interval` while the agent is running. Errors are
/// caught at the task boundary; the next cycle still fires.
pub fn spawn_periodic<F, Fut>(
    state: SharedState,
    name: &'static str,
    interval: Duration,
    mut action: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    tokio::spawn(async move {
        while state.is_running() {
            if let Err(e) = action().await {
                warn!(task = name, "cycle failed: {e:#}");
            }
            sleep(interval).await;
        }
        debug!(task = name, "task stopped");
    })
}

/// Registers the two periodic tasks of the agent: status reporting and
/// screenshot capture. Both read shared state; neither can mutate
/// `running` or `close_approved`.
pub struct Scheduler {
    state: SharedState,
    remote: Arc<dyn RemoteAuthority>,
    config: Config,
}

impl Scheduler {
    pub fn new(state: SharedState, remote: Arc<dyn RemoteAuthority>, config: Config) -> Self {
        Self {
            state,
            remote,
            config,
        }
    }

    /// Reporting is disabled until a credential is configured; the agent
    /// still runs and the close protocol still reaches the server.
    fn reporting_enabled(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    /// Report the active window and idle/working state every
    /// `activity_interval`.
    pub fn spawn_status_reporter(
        &self,
        monitor: ActivityMonitor,
        inspector: Arc<dyn WindowInspector>,
    ) -> JoinHandle<()> {
        let remote = Arc::clone(&self.remote);
        let enabled = self.reporting_enabled();
        let interval_secs = self.config.activity_interval;
        spawn_periodic(
            self.state.clone(),
            "status-report",
            self.config.activity_interval(),
            move || {
                let remote = Arc::clone(&remote);
                let inspector = Arc::clone(&inspector);
                let monitor = monitor.clone();
                async move {
                    if !enabled {
                        return Ok(());
                    }
                    let app_name = inspector.active_window_title();
                    let status = if monitor.is_idle() {
                        ActivityStatus::Idle
                    } else {
                        ActivityStatus::Working
                    };
                    remote
                        .report_status(&app_name, status, interval_secs)
                        .await?;
                    info!(
                        app = %truncate(&app_name, 30),
                        %status,
                        "activity logged"
                    );
                    Ok(())
                }
            },
        )
    }

    /// Capture and upload the screen every `screenshot_interval`. A probe
    /// without capture support skips the cycle.
    pub fn spawn_screenshot_task(&self, grabber: Arc<dyn ScreenGrabber>) -> JoinHandle<()> {
        let remote = Arc::clone(&self.remote);
        let enabled = self.reporting_enabled();
        let quality = self.config.screenshot_quality;
        spawn_periodic(
            self.state.clone(),
            "screenshot",
            self.config.screenshot_interval(),
            move || {
                let remote = Arc::clone(&remote);
                let grabber = Arc::clone(&grabber);
                async move {
                    if !enabled {
                        return Ok(());
                    }
                    match grabber.capture(quality) {
                        Some(image) => {
                            remote.upload_screenshot(image, grabber.mime_type()).await?;
                            info!("screenshot uploaded");
                        }
                        None => debug!("screen capture unavailable, skipping"),
                    }
                    Ok(())
                }
            },
        )
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{NullScreenGrabber, NullWindowInspector};
    use crate::remote::testing::ScriptedRemote;
    use crate::state::{CloseRequest, SharedState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config(api_key: &str) -> Config {
        Config {
            api_key: api_key.to_string(),
            api_url: "https://example.test/api".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_periodic_task_survives_errors() {
        let state = SharedState::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let handle = spawn_periodic(
            state.clone(),
            "flaky",
            Duration::from_millis(10),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        anyhow::bail!("transient failure");
                    }
                    Ok(())
                }
            },
        );

        sleep(Duration::from_millis(55)).await;
        assert!(
            calls.load(Ordering::SeqCst) >= 3,
            "loop must keep firing after a failed cycle"
        );

        // Cooperative shutdown through the sanctioned path only.
        state.set_pending(CloseRequest::pending("req-1".to_string()));
        assert!(state.approve_close("req-1"));
        sleep(Duration::from_millis(30)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_status_reporter_reports_idle_transitions() {
        let state = SharedState::new();
        let remote = Arc::new(ScriptedRemote::new());
        let mut config = test_config("key");
        config.activity_interval = 1;
        config.idle_threshold = 5;

        // Drive the report cycle on a simulated tick clock. Each cycle
        // pins the last input event to half a second short of a whole
        // tick behind, so the wall time the test itself spends can never
        // push the elapsed time across the threshold.
        let monitor = ActivityMonitor::new(state.clone(), config.idle_threshold());
        let inspector = NullWindowInspector;
        let mut last_activity_tick = 0u64;
        for tick in 1..=8u64 {
            let since_activity =
                Duration::from_millis((tick - last_activity_tick) * 1000 - 500);
            state.set_activity_elapsed(since_activity);
            let status = if monitor.is_idle() {
                ActivityStatus::Idle
            } else {
                ActivityStatus::Working
            };
            remote
                .report_status(&inspector.active_window_title(), status, 1)
                .await
                .unwrap();
            // One input event arrives at tick 6, after that tick's report
            // already went out.
            if tick == 6 {
                last_activity_tick = 6;
            }
        }

        let reports = remote.reports.lock();
        let statuses: Vec<ActivityStatus> = reports.iter().map(|(_, s, _)| *s).collect();
        // Working through tick 5 (4.5s < 5s), idle at tick 6 (5.5s > 5s),
        // working again from tick 7 thanks to the tick-6 input event.
        assert_eq!(statuses[3], ActivityStatus::Working);
        assert_eq!(statuses[4], ActivityStatus::Working);
        assert_eq!(statuses[5], ActivityStatus::Idle);
        assert_eq!(statuses[6], ActivityStatus::Working);
        assert_eq!(statuses[7], ActivityStatus::Working);
        assert!(reports.iter().all(|(app, _, d)| app == "Unknown" && *d == 1));
    }

    #[tokio::test]
    async fn test_reporter_task_posts_through_remote() {
        let state = SharedState::new();
        let remote = Arc::new(ScriptedRemote::new());
        let mut config = test_config("key");
        config.activity_interval = 1;

        let scheduler = Scheduler::new(state.clone(), remote.clone(), config.clone());
        let monitor = ActivityMonitor::new(state.clone(), config.idle_threshold());
        let handle = scheduler.spawn_status_reporter(monitor, Arc::new(NullWindowInspector));

        sleep(Duration::from_millis(50)).await;
        assert!(!remote.reports.lock().is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn test_empty_api_key_skips_reporting() {
        let state = SharedState::new();
        let remote = Arc::new(ScriptedRemote::new());
        let mut config = test_config("");
        config.api_url = String::new();
        config.activity_interval = 1;
        config.screenshot_interval = 1;

        let scheduler = Scheduler::new(state.clone(), remote.clone(), config.clone());
        let monitor = ActivityMonitor::new(state.clone(), config.idle_threshold());
        let reporter = scheduler.spawn_status_reporter(monitor, Arc::new(NullWindowInspector));
        let shots = scheduler.spawn_screenshot_task(Arc::new(NullScreenGrabber));

        sleep(Duration::from_millis(40)).await;
        assert!(remote.reports.lock().is_empty());
        assert!(remote.uploads.lock().is_empty());
        reporter.abort();
        shots.abort();
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 30), "hello");
        assert_eq!(truncate("ααααα", 3), "ααα");
    }
}
