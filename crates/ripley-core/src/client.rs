// ── Dashboard client ──
//
// Composition root: one connection manager, one dispatcher, one REST
// collaborator, and factories for mounted views. Construct it once at
// application start and hand it to whatever renders the dashboard.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::info;

use ripley_api::models::StartRipRequest;
use ripley_api::{
    Envelope, RestClient, SnapshotSource, Transport, TransportConfig, TungsteniteTransport,
};

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::dispatch::{EventDispatcher, Subscription};
use crate::error::CoreError;
use crate::notify::{Notifier, TracingNotifier};
use crate::surface::{DrivesSurface, IssuesSurface, LogsSurface, OperationsSurface};
use crate::view::{ReconciledView, Surface, ViewOptions};

/// Every surface of the dashboard, mounted.
pub struct Dashboard {
    pub drives: ReconciledView<DrivesSurface>,
    pub operations: ReconciledView<OperationsSurface>,
    pub issues: ReconciledView<IssuesSurface>,
    pub logs: ReconciledView<LogsSurface>,
}

impl Dashboard {
    /// Unmount every view. Dropping the dashboard does the same.
    pub fn unmount(&self) {
        self.drives.unmount();
        self.operations.unmount();
        self.issues.unmount();
        self.logs.unmount();
    }
}

/// The real-time dashboard client.
pub struct DashboardClient {
    config: ClientConfig,
    dispatcher: EventDispatcher,
    connection: ConnectionManager,
    source: Arc<dyn SnapshotSource>,
    rest: Option<RestClient>,
    notifier: Arc<dyn Notifier>,
}

impl DashboardClient {
    /// Production client: `reqwest` for REST, `tokio-tungstenite` for the
    /// event socket, notifications written to the log.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let transport_config = TransportConfig {
            timeout: config.timeout,
            accept_invalid_certs: config.accept_invalid_certs,
        };
        let rest = RestClient::new(config.base_url.clone(), &transport_config)?;
        let mut client = Self::from_parts(
            config,
            Arc::new(TungsteniteTransport),
            Arc::new(rest.clone()),
            Arc::new(TracingNotifier),
        )?;
        client.rest = Some(rest);
        Ok(client)
    }

    /// Client over arbitrary collaborators. Commands are unavailable
    /// until a REST client is attached with [`with_rest`](Self::with_rest).
    pub fn from_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        source: Arc<dyn SnapshotSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CoreError> {
        let dispatcher = EventDispatcher::new();
        let connection = ConnectionManager::for_page(
            transport,
            &config.base_url,
            dispatcher.clone(),
            config.reconnect,
        )?;
        info!(url = %connection.url(), "dashboard client ready");

        Ok(Self {
            config,
            dispatcher,
            connection,
            source,
            rest: None,
            notifier,
        })
    }

    pub fn with_rest(mut self, rest: RestClient) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ── Connection ───────────────────────────────────────────────────

    pub fn connect(&self) {
        self.connection.connect();
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state()
    }

    pub fn connection_status(&self) -> watch::Receiver<bool> {
        self.connection.status()
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Register a raw callback for one event type.
    pub fn on<F>(&self, event_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.dispatcher.on(event_type, callback)
    }

    /// Every envelope, including the synthetic `connection` events.
    pub fn events(&self) -> broadcast::Receiver<Arc<Envelope>> {
        self.dispatcher.stream()
    }

    // ── Views ────────────────────────────────────────────────────────

    pub async fn mount_drives(&self) -> ReconciledView<DrivesSurface> {
        let options = ViewOptions {
            resync_interval: self.config.resync.drives,
            tick: Some(self.config.elapsed_tick),
        };
        self.mount(DrivesSurface::new(), options).await
    }

    pub async fn mount_operations(&self) -> ReconciledView<OperationsSurface> {
        let options = ViewOptions {
            resync_interval: self.config.resync.operations,
            tick: None,
        };
        self.mount(OperationsSurface::new(), options).await
    }

    pub async fn mount_issues(&self) -> ReconciledView<IssuesSurface> {
        let options = ViewOptions {
            resync_interval: self.config.resync.issues,
            tick: None,
        };
        self.mount(IssuesSurface::new(), options).await
    }

    pub async fn mount_logs(&self) -> ReconciledView<LogsSurface> {
        let options = ViewOptions {
            resync_interval: self.config.resync.logs,
            tick: None,
        };
        self.mount(LogsSurface::new(self.config.log_capacity), options)
            .await
    }

    /// Mount every surface concurrently.
    pub async fn mount_all(&self) -> Dashboard {
        let (drives, operations, issues, logs) = tokio::join!(
            self.mount_drives(),
            self.mount_operations(),
            self.mount_issues(),
            self.mount_logs(),
        );
        Dashboard {
            drives,
            operations,
            issues,
            logs,
        }
    }

    async fn mount<S: Surface>(&self, surface: S, options: ViewOptions) -> ReconciledView<S> {
        ReconciledView::mount(
            surface,
            &self.dispatcher,
            Arc::clone(&self.source),
            Arc::clone(&self.notifier),
            options,
        )
        .await
    }

    // ── Commands ─────────────────────────────────────────────────────
    //
    // A successful response only means the service accepted the command.
    // Its effect reaches the views through events or the next resync.

    fn rest(&self) -> Result<&RestClient, CoreError> {
        self.rest.as_ref().ok_or_else(|| CoreError::Config {
            message: "no REST client attached".into(),
        })
    }

    pub async fn eject_drive(&self, device: &str) -> Result<(), CoreError> {
        Ok(self.rest()?.eject_drive(device).await?)
    }

    pub async fn start_rip(&self, request: &StartRipRequest) -> Result<Value, CoreError> {
        Ok(self.rest()?.start_rip(request).await?)
    }

    pub async fn stop_rip(&self) -> Result<(), CoreError> {
        Ok(self.rest()?.stop_rip().await?)
    }

    pub async fn pause_rip(&self, drive: &str) -> Result<(), CoreError> {
        Ok(self.rest()?.pause_rip(drive).await?)
    }

    pub async fn resume_rip(&self, drive: &str) -> Result<(), CoreError> {
        Ok(self.rest()?.resume_rip(drive).await?)
    }

    pub async fn resolve_issue(&self, id: i64) -> Result<(), CoreError> {
        Ok(self.rest()?.resolve_issue(id).await?)
    }

    /// Clear the service's log table, then the given local tail.
    pub async fn clear_logs(
        &self,
        logs: Option<&ReconciledView<LogsSurface>>,
    ) -> Result<(), CoreError> {
        self.rest()?.clear_logs().await?;
        if let Some(view) = logs {
            view.surface().clear();
        }
        Ok(())
    }
}

impl Drop for DashboardClient {
    fn drop(&mut self) {
        self.connection.disconnect();
    }
}
