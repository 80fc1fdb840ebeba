// ── Dashboard surfaces ──
//
// Each surface owns its reconciled state and the merge policy for the
// event types it consumes. Mount one with `ReconciledView::mount`.

pub mod drives;
pub mod issues;
pub mod logs;
pub mod operations;

pub use drives::{DrivesSnapshot, DrivesSurface, ElapsedMap};
pub use issues::IssuesSurface;
pub use logs::LogsSurface;
pub use operations::{OperationsSnapshot, OperationsSurface};
