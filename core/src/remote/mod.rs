//! Remote authority contract
//!
//! The server is the sole authority over activity logging and close
//! approval. Transport lives behind this trait so the lifecycle tests
//! can script verdicts without a network.

pub mod http;

use crate::state::RequestStatus;
use serde::Deserialize;

pub use http::HttpRemoteAuthority;

/// Errors from remote authority calls
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Transport or timeout failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Server answered with a non-success status code
    #[error("server returned status {status}")]
    Server { status: u16 },
}

/// What the user is currently doing, as reported to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityStatus {
    Working,
    Idle,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Working => "working",
            ActivityStatus::Idle => "idle",
        }
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receipt for a submitted close request
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitReceipt {
    pub request_id: String,
}

/// Server verdict on an outstanding close request
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionVerdict {
    pub status: RequestStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
pub(crate) mod testing;

/// Server-side API the agent reports to and negotiates shutdown with.
#[async_trait::async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Log the active application and idle/working status for one
    /// reporting interval.
    async fn report_status(
        &self,
        app_name: &str,
        status: ActivityStatus,
        duration_seconds: u64,
    ) -> Result<(), RemoteError>;

    /// Upload one captured screen image.
    async fn upload_screenshot(&self, image: Vec<u8>, mime_type: &str) -> Result<(), RemoteError>;

    /// Ask the server for permission to terminate. The server assigns
    /// the request id.
    async fn submit_close_request(&self) -> Result<SubmitReceipt, RemoteError>;

    /// Refresh the verdict on an outstanding close request.
    async fn check_permission(&self, request_id: &str) -> Result<PermissionVerdict, RemoteError>;
}
