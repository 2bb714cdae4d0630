//! Activity monitor
//!
//! Thin view over the shared state that input collaborators feed and the
//! status reporter reads. Never fails, only computes.

use crate::state::SharedState;
use std::time::Duration;

/// Tracks the last input event and derives idle/active state.
#[derive(Clone)]
pub struct ActivityMonitor {
    state: SharedState,
    idle_threshold: Duration,
}

impl ActivityMonitor {
    pub fn new(state: SharedState, idle_threshold: Duration) -> Self {
        Self {
            state,
            idle_threshold,
        }
    }

    /// Called by input collaborators on every pointer or key event.
    /// Concurrent calls from independent delivery threads are fine.
    pub fn record_activity(&self) {
        self.state.record_activity();
    }

    /// True when the time since the last input event exceeds the
    /// configured threshold. Also refreshes the cached `idle` flag.
    pub fn is_idle(&self) -> bool {
        self.state.check_idle(self.idle_threshold)
    }
}
