//! Real-time state layer between `ripley-api` and dashboard renderers.
//!
//! - **[`DashboardClient`]**: composition root. Owns one
//!   [`ConnectionManager`] and one [`EventDispatcher`], vends mounted views
//!   and forwards commands to the REST API.
//!
//! - **[`ConnectionManager`]**: single reconnecting event socket. A pure
//!   state machine ([`connection::ConnectionMachine`]) decides; the manager
//!   executes socket, timer and publish effects. Exponential backoff, a
//!   capped attempt count, and an explicit disconnect that suppresses
//!   reconnection.
//!
//! - **[`EventDispatcher`]**: fan-out of decoded envelopes to callbacks
//!   registered per event type, plus a broadcast stream of every envelope.
//!   A panicking callback never blocks its siblings.
//!
//! - **[`ReconciledView<S>`]**: one mounted [`Surface`] (drives, operations,
//!   issues, logs) kept current by events and healed by periodic snapshots.
//!   State is exposed as [`EntityStream<T>`] handles over immutable
//!   [`Snapshot`]s.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod connection;
mod convert;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod notify;
mod store;
pub mod stream;
pub mod surface;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{Dashboard, DashboardClient};
pub use config::{ClientConfig, ReconnectPolicy, ResyncIntervals};
pub use connection::{ConnectionManager, ConnectionState};
pub use dispatch::{EventDispatcher, Subscription};
pub use error::CoreError;
pub use notify::{ChannelNotifier, Notification, NotificationLevel, Notifier, TracingNotifier};
pub use store::Snapshot;
pub use stream::{EntityStream, EntityWatchStream};
pub use surface::{DrivesSurface, IssuesSurface, LogsSurface, OperationsSurface};
pub use view::{ReconciledView, Surface, ViewOptions};

pub use model::{
    Agent, Drive, Issue, LogLevel, LogLine, MediaType, Operation, OperationKind, OperationStatus,
    RipActivity, RipState,
};
