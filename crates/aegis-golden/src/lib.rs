//! Aegis Golden
//!
//! Regression gating derived from past accidents:
//!
//! - **Catalog**: accident patterns with severity, blast radius and
//!   occurrence counts
//! - **Selection**: weighted scoring turns the riskiest patterns into
//!   golden tests
//! - **Execution**: bounded retries with backoff, per-attempt timeouts,
//!   every attempt persisted
//! - **Flaky tracking**: stable / suspect / quarantined per test
//! - **Kill switch**: severity-windowed circuit breaker over failures
//!
//! # Architecture
//!
//! ```text
//! PatternCatalog ─> TestSelector ─> GoldenEngine ─┬─> CheckRegistry (typed checks)
//!                                                 ├─> FlakyTracker ──┐
//!                                                 └─> KillSwitch ────┼─> RecordStore
//!                                                                    └─> AlertSink
//! ```

#![warn(unreachable_pub)]

pub mod check;
pub mod engine;
pub mod error;
pub mod flaky;
pub mod golden;
pub mod kill_switch;
pub mod pattern;
pub mod selection;

pub use check::{CheckContext, CheckFailure, CheckRegistry, FnCheck, GoldenCheck, TriggerConditionCheck};
pub use engine::{
    ExecutionConfig, GateReport, GoldenConfig, GoldenEngine, RevalidationOutcome, TestSummary,
};
pub use error::{AttemptError, GoldenError};
pub use flaky::{FlakyPolicy, FlakyState, FlakyTracker, FlakyTransition, FlakyUpdate};
pub use golden::{
    FlakyStatus, GoldenTest, KillSwitchThreshold, Scenario, TestExecutionResult, TestStatus,
};
pub use kill_switch::{
    KillSwitch, KillSwitchAction, KillSwitchConfig, KillSwitchDecision, KillSwitchEntry,
    SeverityThreshold,
};
pub use pattern::{AccidentPattern, PatternCatalog, PatternId};
pub use selection::{
    Rejection, RejectionReason, ScoringWeights, SelectionCriteria, SelectionOutcome, TestSelector,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
