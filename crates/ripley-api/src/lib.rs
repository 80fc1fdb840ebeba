// ripley-api: Async Rust client for the Ripley ripping service
// (REST snapshots and commands, plus the event socket transport).

pub mod error;
pub mod events;
pub mod models;
pub mod rest;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use events::{Envelope, EventKind};
pub use rest::{RestClient, SnapshotSource};
pub use transport::TransportConfig;
pub use websocket::{SocketCloser, SocketHandle, SocketSignal, Transport, TungsteniteTransport};
