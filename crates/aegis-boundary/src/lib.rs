//! Aegis Boundary
//!
//! The edge between the safety gate and the outside world:
//!
//! - **Persistence**: the `RecordStore` contract (`append`, atomic
//!   `insert_if_absent`, `query`, `purge_expired`) with an in-memory and an
//!   append-only file implementation
//! - **Notification**: structured `Alert`s delivered through `AlertSink`s
//!
//! # Architecture
//!
//! ```text
//! ActionLedger ─┐                       ┌─> MemoryStore
//! GoldenEngine ─┼─> Arc<dyn RecordStore>┤
//! KillSwitch  ──┤                       └─> FileStore (JSON lines, fsync)
//! Coverage    ──┘
//!
//! KillSwitch / FlakyTracker / Coverage ─> Arc<dyn AlertSink> ─> front-end
//! ```

#![warn(unreachable_pub)]

pub mod alert;
pub mod error;
pub mod file;
pub mod record;
pub mod store;

pub use alert::{Alert, AlertKind, AlertSink, BroadcastAlertSink, FanoutAlertSink, TracingAlertSink};
pub use error::StoreError;
pub use file::FileStore;
pub use record::{InsertOutcome, Record, RecordId, RecordQuery, Scope};
pub use store::{MemoryStore, RecordStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
