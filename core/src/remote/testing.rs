//! Scripted remote authority for tests

use super::{ActivityStatus, PermissionVerdict, RemoteAuthority, RemoteError, SubmitReceipt};
use crate::state::RequestStatus;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory `RemoteAuthority` that records calls and replays scripted
/// verdicts. When the verdict queue runs dry it answers `pending`, and
/// submissions mint sequential ids (`req-1`, `req-2`, ...).
#[derive(Default)]
pub(crate) struct ScriptedRemote {
    pub reports: Mutex<Vec<(String, ActivityStatus, u64)>>,
    pub uploads: Mutex<Vec<(usize, String)>>,
    pub submit_calls: AtomicUsize,
    pub fail_next_submit: AtomicUsize,
    pub verdicts: Mutex<VecDeque<Result<PermissionVerdict, u16>>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_verdict(&self, status: RequestStatus, reason: Option<&str>) {
        self.verdicts.lock().push_back(Ok(PermissionVerdict {
            status,
            reason: reason.map(str::to_string),
        }));
    }

    pub fn push_poll_failure(&self, status: u16) {
        self.verdicts.lock().push_back(Err(status));
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteAuthority for ScriptedRemote {
    async fn report_status(
        &self,
        app_name: &str,
        status: ActivityStatus,
        duration_seconds: u64,
    ) -> Result<(), RemoteError> {
        self.reports
            .lock()
            .push((app_name.to_string(), status, duration_seconds));
        Ok(())
    }

    async fn upload_screenshot(&self, image: Vec<u8>, mime_type: &str) -> Result<(), RemoteError> {
        self.uploads.lock().push((image.len(), mime_type.to_string()));
        Ok(())
    }

    async fn submit_close_request(&self) -> Result<SubmitReceipt, RemoteError> {
        if self.fail_next_submit.load(Ordering::SeqCst) > 0 {
            self.fail_next_submit.fetch_sub(1, Ordering::SeqCst);
            return Err(RemoteError::Server { status: 500 });
        }
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SubmitReceipt {
            request_id: format!("req-{n}"),
        })
    }

    async fn check_permission(&self, _request_id: &str) -> Result<PermissionVerdict, RemoteError> {
        match self.verdicts.lock().pop_front() {
            Some(Ok(verdict)) => Ok(verdict),
            Some(Err(status)) => Err(RemoteError::Server { status }),
            None => Ok(PermissionVerdict {
                status: RequestStatus::Pending,
                reason: None,
            }),
        }
    }
}
