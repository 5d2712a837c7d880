//! Aegis Types - shared vocabulary
//!
//! The leaf crate every other Aegis crate builds on:
//! - Severity, blast radius and impact levels
//! - Proposals (candidate actions) and their task types
//! - Injectable clocks
//! - `ValidationError`

#![warn(unreachable_pub)]

pub mod clock;
pub mod error;
pub mod proposal;
pub mod severity;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ValidationError;
pub use proposal::{ExecutionId, Proposal, ProposalId, TaskType};
pub use severity::{BlastRadius, Impact, Severity};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
