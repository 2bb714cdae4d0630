//! Shared agent state
//!
//! One `AgentState` exists per process, shared by every concurrent unit
//! (input delivery, periodic tasks, the approval poller, the control
//! surface) behind a single mutex. Fields are private on purpose: the
//! only way to reach `running = false` is [`SharedState::approve_close`],
//! which also performs the sole `close_approved` write. That keeps the
//! "no shutdown without approval" contract a compile-time property
//! instead of a runtime check.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Server-side status of a close request; the local copy is a cache
/// refreshed by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

/// A close request tracked against the remote authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRequest {
    /// Assigned by the server on submission
    pub id: String,
    pub status: RequestStatus,
    /// Present when the request was denied
    pub reason: Option<String>,
}

impl CloseRequest {
    pub fn pending(id: String) -> Self {
        Self {
            id,
            status: RequestStatus::Pending,
            reason: None,
        }
    }
}

#[derive(Debug)]
struct AgentState {
    running: bool,
    last_activity_at: Instant,
    idle: bool,
    close_approved: bool,
    pending_request: Option<CloseRequest>,
    last_denial: Option<String>,
}

/// Cloneable handle to the process-wide agent state.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Mutex<AgentState>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(AgentState {
                running: true,
                last_activity_at: Instant::now(),
                idle: false,
                close_approved: false,
                pending_request: None,
                last_denial: None,
            })),
        }
    }

    /// True while the process intends to keep operating. Periodic loops
    /// re-check this on every wake-up.
    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn close_approved(&self) -> bool {
        self.inner.lock().close_approved
    }

    /// Record an input event. Safe to call from any thread; pointer and
    /// key events may arrive on independent delivery paths.
    pub fn record_activity(&self) {
        let mut state = self.inner.lock();
        state.last_activity_at = Instant::now();
        if state.idle {
            state.idle = false;
        }
    }

    /// Derive idleness from the time since the last input event. The
    /// result is cached into the `idle` flag for observers.
    pub fn check_idle(&self, threshold: Duration) -> bool {
        let mut state = self.inner.lock();
        state.idle = state.last_activity_at.elapsed() > threshold;
        state.idle
    }

    pub fn is_idle(&self) -> bool {
        self.inner.lock().idle
    }

    /// Current outstanding close request, if any.
    pub fn pending_request(&self) -> Option<CloseRequest> {
        self.inner.lock().pending_request.clone()
    }

    /// Reason attached to the most recent denial, if any.
    pub fn last_denial(&self) -> Option<String> {
        self.inner.lock().last_denial.clone()
    }

    /// Track a freshly submitted request. The lifecycle controller
    /// serializes submissions, so an existing entry here is a bug.
    pub(crate) fn set_pending(&self, request: CloseRequest) {
        let mut state = self.inner.lock();
        debug_assert!(state.pending_request.is_none());
        state.pending_request = Some(request);
    }

    /// Approved verdict for the tracked request: flips `close_approved`
    /// (the single false→true write in the process lifetime), clears the
    /// pending request, and permits shutdown. Returns false when `id`
    /// does not match the tracked request, in which case nothing changes.
    pub(crate) fn approve_close(&self, id: &str) -> bool {
        let mut state = self.inner.lock();
        match &state.pending_request {
            Some(request) if request.id == id => {
                state.close_approved = true;
                state.pending_request = None;
                state.running = false;
                true
            }
            _ => false,
        }
    }

    /// Denied verdict: clears the pending request and stores the reason,
    /// defaulting when the server omitted one. Returns the stored reason,
    /// or `None` when `id` is not the tracked request (nothing changes).
    /// A later close attempt submits a fresh request.
    pub(crate) fn deny_close(&self, id: &str, reason: Option<String>) -> Option<String> {
        let mut state = self.inner.lock();
        match &state.pending_request {
            Some(request) if request.id == id => {
                state.pending_request = None;
                let reason = reason.unwrap_or_else(|| "No reason provided".to_string());
                state.last_denial = Some(reason.clone());
                Some(reason)
            }
            _ => None,
        }
    }

    /// Shift the last-activity timestamp into the past (test clock).
    #[cfg(test)]
    pub(crate) fn backdate_activity(&self, by: Duration) {
        let mut state = self.inner.lock();
        if let Some(earlier) = state.last_activity_at.checked_sub(by) {
            state.last_activity_at = earlier;
        }
    }

    /// Pin the last-activity timestamp to exactly `elapsed` ago,
    /// regardless of what it was before (test clock).
    #[cfg(test)]
    pub(crate) fn set_activity_elapsed(&self, elapsed: Duration) {
        let mut state = self.inner.lock();
        if let Some(then) = Instant::now().checked_sub(elapsed) {
            state.last_activity_at = then;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SharedState::new();
        assert!(state.is_running());
        assert!(!state.close_approved());
        assert!(!state.is_idle());
        assert!(state.pending_request().is_none());
    }

    #[test]
    fn test_approve_requires_matching_id() {
        let state = SharedState::new();
        state.set_pending(CloseRequest::pending("req-1".to_string()));

        assert!(!state.approve_close("req-2"));
        assert!(state.is_running());
        assert!(!state.close_approved());

        assert!(state.approve_close("req-1"));
        assert!(!state.is_running());
        assert!(state.close_approved());
        assert!(state.pending_request().is_none());
    }

    #[test]
    fn test_approve_without_pending_is_rejected() {
        let state = SharedState::new();
        assert!(!state.approve_close("req-1"));
        assert!(state.is_running());
        assert!(!state.close_approved());
    }

    #[test]
    fn test_deny_clears_pending_and_keeps_running() {
        let state = SharedState::new();
        state.set_pending(CloseRequest::pending("req-1".to_string()));

        let stored = state.deny_close("req-1", Some("pending deadline".to_string()));
        assert_eq!(stored.as_deref(), Some("pending deadline"));
        assert!(state.is_running());
        assert!(!state.close_approved());
        assert!(state.pending_request().is_none());
        assert_eq!(state.last_denial().as_deref(), Some("pending deadline"));
    }

    #[test]
    fn test_deny_without_reason_stores_default() {
        let state = SharedState::new();
        state.set_pending(CloseRequest::pending("req-1".to_string()));

        let stored = state.deny_close("req-1", None);
        assert_eq!(stored.as_deref(), Some("No reason provided"));
        assert_eq!(state.last_denial().as_deref(), Some("No reason provided"));
    }

    #[test]
    fn test_deny_requires_matching_id() {
        let state = SharedState::new();
        state.set_pending(CloseRequest::pending("req-1".to_string()));

        assert!(state.deny_close("req-2", None).is_none());
        assert!(state.pending_request().is_some());
        assert!(state.last_denial().is_none());
    }

    #[test]
    fn test_idle_derivation_and_reset() {
        let state = SharedState::new();
        let threshold = Duration::from_secs(300);

        state.backdate_activity(Duration::from_secs(299));
        assert!(!state.check_idle(threshold));

        state.backdate_activity(Duration::from_secs(2));
        assert!(state.check_idle(threshold));
        assert!(state.is_idle());

        state.record_activity();
        assert!(!state.is_idle());
        assert!(!state.check_idle(threshold));
    }
}
