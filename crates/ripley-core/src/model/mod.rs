// ── Domain model ──
//
// Reconciled records held by the dashboard views. Wire enums that need no
// normalisation are re-exported from `ripley-api` unchanged.

pub mod drive;
pub mod issue;
pub mod log;
pub mod operation;

pub use drive::{Drive, RipActivity, RipState};
pub use issue::Issue;
pub use log::LogLine;
pub use operation::{Agent, Operation, OperationKind, operation_key};
pub use ripley_api::models::{LogLevel, MediaType, OperationStatus};
