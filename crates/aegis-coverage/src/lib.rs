//! Aegis Coverage
//!
//! Tracks how much of the accident catalog is guarded by golden tests:
//! per-severity breakdown, uncovered patterns, the trend between the two
//! latest snapshots, and prioritized warnings
//! (critical gap > declining > below target).

#![warn(unreachable_pub)]

pub mod error;
pub mod metrics;
pub mod tracker;

pub use error::CoverageError;
pub use metrics::{
    calculate_coverage, CoverageConfig, CoverageMetrics, SeverityCoverage, UncoveredPattern,
};
pub use tracker::{
    generate_warnings, CoverageReport, CoverageSnapshot, CoverageTracker, CoverageTrend,
    CoverageWarning, CoverageWarningKind, TrendReport,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
