//! Aegis Core
//!
//! The safety gate in front of an autonomous agent's actions. One
//! `SafetyGate::evaluate` call per candidate action composes:
//!
//! - **Confidence router**: auto approve, review or red team
//! - **Action ledger**: at-most-once claim of the action's dedupe key
//! - **Golden engine**: regression checks derived from past accidents,
//!   flaky tracking and the kill switch
//! - **Coverage tracker**: periodic report on unguarded accident patterns
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  SafetyGate                  │
//! ├──────────┬──────────┬───────────┬────────────┤
//! │  Router  │  Ledger  │  Golden   │  Coverage  │
//! ├──────────┴──────────┴───────────┴────────────┤
//! │        RecordStore · Clock · AlertSink       │
//! └──────────────────────────────────────────────┘
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod gate;
pub mod telemetry;

pub use config::{ConfigError, GateConfig, LoggingConfig};
pub use error::GateError;
pub use gate::{
    BlockReason, CoverageTaskHandle, Disposition, GateVerdict, SafetyGate, SafetyGateBuilder,
};
pub use telemetry::init_tracing;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
