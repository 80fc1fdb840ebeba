// ── Reconciled storage ──
//
// Keyed collections for entity surfaces and a bounded buffer for the
// log tail. Both publish immutable snapshots through `watch` channels.

pub(crate) mod collection;
pub(crate) mod log_buffer;

pub use collection::Snapshot;
pub(crate) use collection::EntityCollection;
pub(crate) use log_buffer::LogBuffer;
