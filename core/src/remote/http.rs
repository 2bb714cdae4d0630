//! HTTP implementation of the remote authority
//!
//! JSON over HTTPS with the static `x-api-key` credential on every call.
//! Timeouts are bounded (10s, 30s for screenshot uploads) so a stalled
//! call blocks only its owning task.

use super::{ActivityStatus, PermissionVerdict, RemoteAuthority, RemoteError, SubmitReceipt};
use anyhow::{Context, Result};
use reqwest::{header::CONTENT_TYPE, Client as HttpClient, Response};
use serde_json::json;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-api-key";
const CALL_TIMEOUT: Duration = Duration::from_secs(10);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpRemoteAuthority {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl HttpRemoteAuthority {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(CALL_TIMEOUT)
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn check_status(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(RemoteError::Server {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait::async_trait]
impl RemoteAuthority for HttpRemoteAuthority {
    async fn report_status(
        &self,
        app_name: &str,
        status: ActivityStatus,
        duration_seconds: u64,
    ) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(self.url("log-activity"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&json!({
                "app_name": app_name,
                "status": status.as_str(),
                "duration_seconds": duration_seconds,
            }))
            .send()
            .await?;
        Self::check_status(response)?;
        Ok(())
    }

    async fn upload_screenshot(&self, image: Vec<u8>, mime_type: &str) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(self.url("upload-screenshot"))
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, mime_type)
            .timeout(UPLOAD_TIMEOUT)
            .body(image)
            .send()
            .await?;
        Self::check_status(response)?;
        Ok(())
    }

    async fn submit_close_request(&self) -> Result<SubmitReceipt, RemoteError> {
        let response = self
            .http
            .post(self.url("agent-request"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&json!({ "request_type": "close" }))
            .send()
            .await?;
        let receipt = Self::check_status(response)?.json::<SubmitReceipt>().await?;
        Ok(receipt)
    }

    async fn check_permission(&self, request_id: &str) -> Result<PermissionVerdict, RemoteError> {
        let response = self
            .http
            .get(self.url("check-permission"))
            .query(&[("request_id", request_id)])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let verdict = Self::check_status(response)?
            .json::<PermissionVerdict>()
            .await?;
        Ok(verdict)
    }
}
