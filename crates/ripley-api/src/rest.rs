// REST client for the ripping service.
//
// Wraps `reqwest::Client` with path construction, `{ "error": ... }`
// unwrapping, and typed snapshot reads. Commands only trigger server-side
// changes: their effect is observed later through the event stream or the
// next snapshot, never assumed from the HTTP response.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{
    AgentRecord, DriveInfo, ErrorBody, IssueRecord, LogRecord, OperationRecord, RipStatus,
    StartRipRequest, UpscalingJobRecord,
};
use crate::transport::TransportConfig;

// ── SnapshotSource ───────────────────────────────────────────────────

/// Read side of the REST service: every snapshot the dashboard views seed
/// and resync from.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    /// `GET /api/drives`
    async fn drives(&self) -> Result<Vec<DriveInfo>, Error>;
    /// `GET /api/status`
    async fn rip_status(&self) -> Result<RipStatus, Error>;
    /// `GET /api/logs` (newest first)
    async fn recent_logs(&self) -> Result<Vec<LogRecord>, Error>;
    /// `GET /api/issues/active`
    async fn active_issues(&self) -> Result<Vec<IssueRecord>, Error>;
    /// `GET /api/operations`
    async fn operations(&self) -> Result<Vec<OperationRecord>, Error>;
    /// `GET /api/upscaling-jobs`
    async fn upscaling_jobs(&self) -> Result<Vec<UpscalingJobRecord>, Error>;
    /// `GET /api/agents`
    async fn agents(&self) -> Result<Vec<AgentRecord>, Error>;
}

// ── RestClient ───────────────────────────────────────────────────────

/// HTTP client for the ripping service's `/api` surface.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    /// Create a client for the service rooted at `base_url`
    /// (e.g. `http://ripper.local:3000`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// `POST /api/drives/{device}/eject`
    pub async fn eject_drive(&self, device: &str) -> Result<(), Error> {
        let url = self.api_url(&["drives", device, "eject"])?;
        self.send::<(), serde_json::Value>(Method::POST, url, None).await?;
        Ok(())
    }

    /// `POST /api/rip/start`
    pub async fn start_rip(&self, request: &StartRipRequest) -> Result<serde_json::Value, Error> {
        let url = self.api_url(&["rip", "start"])?;
        self.send(Method::POST, url, Some(request)).await
    }

    /// `POST /api/rip/stop`
    pub async fn stop_rip(&self) -> Result<(), Error> {
        let url = self.api_url(&["rip", "stop"])?;
        self.send::<(), serde_json::Value>(Method::POST, url, None).await?;
        Ok(())
    }

    /// `PUT /api/rip/{drive}/pause`
    pub async fn pause_rip(&self, drive: &str) -> Result<(), Error> {
        let url = self.api_url(&["rip", drive, "pause"])?;
        self.send::<(), serde_json::Value>(Method::PUT, url, None).await?;
        Ok(())
    }

    /// `PUT /api/rip/{drive}/resume`
    pub async fn resume_rip(&self, drive: &str) -> Result<(), Error> {
        let url = self.api_url(&["rip", drive, "resume"])?;
        self.send::<(), serde_json::Value>(Method::PUT, url, None).await?;
        Ok(())
    }

    /// `POST /api/issues/{id}/resolve`
    pub async fn resolve_issue(&self, id: i64) -> Result<(), Error> {
        let url = self.api_url(&["issues", &id.to_string(), "resolve"])?;
        self.send::<(), serde_json::Value>(Method::POST, url, None).await?;
        Ok(())
    }

    /// `DELETE /api/logs/clear`
    pub async fn clear_logs(&self) -> Result<(), Error> {
        let url = self.api_url(&["logs", "clear"])?;
        self.send::<(), serde_json::Value>(Method::DELETE, url, None).await?;
        Ok(())
    }

    // ── Transport mechanics ──────────────────────────────────────────

    /// Build `{base}/api/{segments...}`, percent-encoding each segment
    /// (device paths like `/dev/disk2` become one segment).
    fn api_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, Error> {
        let url = self.api_url(segments)?;
        self.send::<(), T>(Method::GET, url, None).await
    }

    async fn send<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T, Error> {
        debug!(%method, url = %url, "ripley request");

        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        trace!(status = status.as_u16(), body = %text, "ripley response");

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_owned());
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        // Some commands answer 200 with an empty body.
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.to_owned(),
        })
    }
}

#[async_trait]
impl SnapshotSource for RestClient {
    async fn drives(&self) -> Result<Vec<DriveInfo>, Error> {
        self.get(&["drives"]).await
    }

    async fn rip_status(&self) -> Result<RipStatus, Error> {
        self.get(&["status"]).await
    }

    async fn recent_logs(&self) -> Result<Vec<LogRecord>, Error> {
        self.get(&["logs"]).await
    }

    async fn active_issues(&self) -> Result<Vec<IssueRecord>, Error> {
        self.get(&["issues", "active"]).await
    }

    async fn operations(&self) -> Result<Vec<OperationRecord>, Error> {
        self.get(&["operations"]).await
    }

    async fn upscaling_jobs(&self) -> Result<Vec<UpscalingJobRecord>, Error> {
        self.get(&["upscaling-jobs"]).await
    }

    async fn agents(&self) -> Result<Vec<AgentRecord>, Error> {
        self.get(&["agents"]).await
    }
}
