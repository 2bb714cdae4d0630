//! Control surface
//!
//! Line-oriented stand-in for the tray indicator: it exposes exactly one
//! shutdown-related action, "close", which routes into the lifecycle
//! controller. There is no other way to stop the agent from here. The
//! loop blocks the main thread and unblocks only when `running` flips to
//! false through the sanctioned approval path.

use console::Style;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;
use vigil_core::lifecycle::{CloseAttempt, LifecycleController};
use vigil_core::monitor::ActivityMonitor;
use vigil_core::SharedState;

/// How often the loop re-checks `running` while waiting for input.
const WAKE_INTERVAL: Duration = Duration::from_millis(500);

pub struct ControlSurface {
    state: SharedState,
    controller: Arc<LifecycleController>,
    monitor: ActivityMonitor,
}

impl ControlSurface {
    pub fn new(
        state: SharedState,
        controller: Arc<LifecycleController>,
        monitor: ActivityMonitor,
    ) -> Self {
        Self {
            state,
            controller,
            monitor,
        }
    }

    /// Block until shutdown is approved. Must run on a blocking thread;
    /// `handle` bridges back into the async runtime for controller calls.
    pub fn run(&self, handle: Handle) {
        let lines = spawn_stdin_reader();
        println!("Commands: close (requires admin approval), status, help");

        loop {
            match lines.recv_timeout(WAKE_INTERVAL) {
                Ok(line) => {
                    // Console input counts as user activity.
                    self.monitor.record_activity();
                    self.dispatch(line.trim(), &handle);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    // stdin is gone (detached run); keep watching state.
                    std::thread::sleep(WAKE_INTERVAL);
                }
            }
            if !self.state.is_running() {
                break;
            }
        }

        let green = Style::new().green();
        println!("{}", green.apply_to("Close approved by admin. Shutting down."));
    }

    fn dispatch(&self, command: &str, handle: &Handle) {
        match command {
            "close" => self.request_close(handle),
            "status" => self.print_status(),
            "help" | "" => {
                println!("Commands: close (requires admin approval), status, help");
            }
            other => {
                println!("Unknown command '{other}'. Try 'help'.");
            }
        }
    }

    fn request_close(&self, handle: &Handle) {
        match handle.block_on(self.controller.request_close()) {
            Ok(CloseAttempt::Submitted { request_id }) => {
                println!("Close request submitted (id: {request_id}).");
                println!("Waiting for admin approval...");
            }
            Ok(CloseAttempt::AlreadyPending { request_id }) => {
                println!("Close request already pending (id: {request_id}).");
            }
            Err(e) => {
                warn!("close request submission failed: {e}");
                println!("Could not submit the close request. Please try again.");
            }
        }
    }

    fn print_status(&self) {
        let activity = if self.state.is_idle() { "idle" } else { "working" };
        println!("Agent: active ({activity})");
        match self.state.pending_request() {
            Some(request) => println!("Close request pending (id: {}).", request.id),
            None => println!("No close request pending."),
        }
        if let Some(reason) = self.state.last_denial() {
            println!("Last close request was denied: {reason}");
        }
    }
}

/// Forward stdin lines over a channel so the main loop can time out and
/// observe state changes between reads.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    use std::io::BufRead;

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}
