//! Golden tests and their execution records

use crate::flaky::FlakyState;
use crate::pattern::{AccidentPattern, PatternId};
use aegis_types::{BlastRadius, ExecutionId, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the kill switch reacts to failures of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillSwitchThreshold {
    /// One failure halts execution
    Immediate,
    /// Halts after repeated failures within a window
    Delayed,
    /// Never halts, only warns
    Warning,
}

impl KillSwitchThreshold {
    /// Threshold class for a test severity
    #[inline]
    #[must_use]
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Self::Immediate,
            Severity::High | Severity::Medium => Self::Delayed,
            Severity::Low => Self::Warning,
        }
    }
}

/// Flaky classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlakyStatus {
    /// Trusted
    #[default]
    Stable,
    /// Failed repeatedly; still gating
    Suspect,
    /// Excluded from pre-execution gates
    Quarantined,
}

impl FlakyStatus {
    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Suspect => "suspect",
            Self::Quarantined => "quarantined",
        }
    }
}

/// Given/When/Then description of a test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Preconditions
    pub given: String,
    /// Triggering action
    pub when: String,
    /// Expected safe outcome
    pub then: String,
}

impl Scenario {
    /// Build scenario from an accident pattern
    #[must_use]
    pub fn from_pattern(pattern: &AccidentPattern) -> Self {
        let given = if pattern.trigger_conditions.is_empty() {
            "Given normal operating conditions".to_string()
        } else {
            format!("Given {}", pattern.trigger_conditions.join(" and "))
        };
        let when = if pattern.root_cause.trim().is_empty() {
            "When the action is attempted".to_string()
        } else {
            format!("When {}", pattern.root_cause.trim())
        };
        let then = if pattern.description.trim().is_empty() {
            format!("Then '{}' must not recur", pattern.title)
        } else {
            format!("Then it must not happen again: {}", pattern.description.trim())
        };
        Self { given, when, then }
    }
}

/// Regression check derived from one accident pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenTest {
    /// Test ID
    pub id: String,
    /// Originating pattern
    pub pattern_id: PatternId,
    /// Human-readable description
    pub scenario: Scenario,
    /// Severity copied from the pattern
    pub severity: Severity,
    /// Blast radius copied from the pattern
    pub blast_radius: BlastRadius,
    /// Occurrence count of the pattern at selection time
    pub frequency: u32,
    /// Selection score in [0, 1]
    pub selection_score: f64,
    /// Trigger conditions of the pattern, used by the built-in check
    #[serde(default)]
    pub trigger_conditions: Vec<String>,
    /// Registered check to run
    pub check_id: String,
    /// Per-attempt time bound
    pub timeout_ms: u64,
    /// Flaky classification
    #[serde(default)]
    pub flaky_status: FlakyStatus,
    /// Consecutive failures
    #[serde(default)]
    pub failure_count: u32,
    /// Consecutive passes
    #[serde(default)]
    pub consecutive_passes: u32,
    /// Kill switch class
    pub kill_switch_threshold: KillSwitchThreshold,
}

impl GoldenTest {
    /// Create test for a pattern
    ///
    /// The check defaults to one registered under the pattern ID.
    #[must_use]
    pub fn from_pattern(pattern: &AccidentPattern, selection_score: f64, timeout_ms: u64) -> Self {
        Self {
            id: format!("golden-{}", pattern.id),
            pattern_id: pattern.id.clone(),
            scenario: Scenario::from_pattern(pattern),
            severity: pattern.severity,
            blast_radius: pattern.blast_radius,
            frequency: pattern.occurrence_count,
            selection_score,
            trigger_conditions: pattern.trigger_conditions.clone(),
            check_id: pattern.id.0.clone(),
            timeout_ms,
            flaky_status: FlakyStatus::Stable,
            failure_count: 0,
            consecutive_passes: 0,
            kill_switch_threshold: KillSwitchThreshold::for_severity(pattern.severity),
        }
    }

    /// With check ID
    #[inline]
    #[must_use]
    pub fn with_check(mut self, check_id: impl Into<String>) -> Self {
        self.check_id = check_id.into();
        self
    }

    /// With timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Copy tracked flaky state onto the test
    #[must_use]
    pub fn with_flaky_state(mut self, state: &FlakyState) -> Self {
        self.flaky_status = state.status;
        self.failure_count = state.failure_count;
        self.consecutive_passes = state.consecutive_passes;
        self
    }

    /// Per-attempt time bound
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check if excluded from gating
    #[inline]
    #[must_use]
    pub fn is_quarantined(&self) -> bool {
        self.flaky_status == FlakyStatus::Quarantined
    }
}

/// Outcome of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Check passed within its bound
    Passed,
    /// Check failed or panicked
    Failed,
    /// Check exceeded its bound
    Timeout,
}

impl TestStatus {
    /// Check if passing
    #[inline]
    #[must_use]
    pub fn is_pass(self) -> bool {
        self == Self::Passed
    }
}

/// One immutable attempt record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestExecutionResult {
    /// Test ID
    pub test_id: String,
    /// Gate invocation
    pub execution_id: ExecutionId,
    /// Scope of the action under test
    #[serde(default)]
    pub scope: String,
    /// Severity of the test
    pub severity: Severity,
    /// When the attempt started
    pub executed_at: DateTime<Utc>,
    /// Wall time of the attempt
    pub duration_ms: u64,
    /// Outcome
    pub status: TestStatus,
    /// 0-based attempt index
    pub retry_attempt: u32,
    /// Whether this attempt concluded the test
    pub is_final_attempt: bool,
    /// Re-validation of a quarantined test; ignored by the kill switch
    #[serde(default)]
    pub revalidation: bool,
    /// Failure detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestExecutionResult {
    /// Check if the attempt failed or timed out
    #[inline]
    #[must_use]
    pub fn failed(&self) -> bool {
        !self.status.is_pass()
    }
}
