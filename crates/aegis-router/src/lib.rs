//! Aegis Router
//!
//! Maps a proposal's confidence, impact and task type to auto-approve,
//! human review or red-team review. Synchronous and free of I/O, so it is
//! always the first stage of the gate.

#![warn(unreachable_pub)]

pub mod router;

pub use router::{ConfidenceRouter, RouterConfig, RoutingDecision, RoutingResult};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
