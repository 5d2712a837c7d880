//! Aegis Ledger
//!
//! Crash-recoverable, at-most-once dedup of proposed actions.
//!
//! - **Atomic claims**: one conditional write per claim; no check-then-write
//! - **Fail closed**: a store failure is an error, never an "accept"
//! - **TTL**: a claim blocks duplicates for 24h by default
//! - **Cleanup**: an optional background task purges expired claims
//!
//! # Example
//!
//! ```ignore
//! let ledger = ActionLedger::new(store, clock, LedgerConfig::default())?;
//! match ledger.claim("send-invoice-42", &payload).await? {
//!     ClaimOutcome::Accepted(_) => execute(),
//!     ClaimOutcome::Duplicate(first) => skip(first.first_seen),
//! }
//! ```

#![warn(unreachable_pub)]

pub mod cleanup;
pub mod error;
pub mod ledger;

pub use cleanup::CleanupHandle;
pub use error::LedgerError;
pub use ledger::{payload_digest, ActionLedger, ActionRecord, ClaimOutcome, LedgerConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
