//! Flaky-test classification
//!
//! Driven by the final attempt of each run:
//!
//! ```text
//!            fail x2                 fail x3
//!  Stable ────────────> Suspect ────────────> Quarantined
//!    ^                     │                      │
//!    └──────── pass ───────┘                      │
//!    └───────────── 20 consecutive passes ────────┘
//! ```
//!
//! State is written through to the `flaky_state` scope before an update
//! returns and read back from it on every lookup; the in-process map only
//! answers when the store cannot.

use crate::golden::{FlakyStatus, GoldenTest};
use aegis_boundary::{Alert, AlertKind, AlertSink, Record, RecordQuery, RecordStore, Scope};
use aegis_types::{Clock, ValidationError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Transition thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlakyPolicy {
    /// Consecutive failures that make a test suspect
    pub suspect_after: u32,
    /// Consecutive failures that quarantine a test
    pub quarantine_after: u32,
    /// Consecutive re-validation passes that restore a quarantined test
    pub restore_after_passes: u32,
}

impl FlakyPolicy {
    /// Validate policy
    ///
    /// # Errors
    /// Zero thresholds or quarantine below suspect
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.suspect_after == 0 || self.restore_after_passes == 0 {
            return Err(ValidationError::InvalidConfig(
                "flaky thresholds must be positive".to_string(),
            ));
        }
        if self.quarantine_after < self.suspect_after {
            return Err(ValidationError::InvalidConfig(format!(
                "flaky.quarantine_after ({}) must not be below suspect_after ({})",
                self.quarantine_after, self.suspect_after
            )));
        }
        Ok(())
    }
}

impl Default for FlakyPolicy {
    fn default() -> Self {
        Self {
            suspect_after: 2,
            quarantine_after: 3,
            restore_after_passes: 20,
        }
    }
}

/// Tracked state of one test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlakyState {
    /// Test ID
    pub test_id: String,
    /// Classification
    pub status: FlakyStatus,
    /// Consecutive failures
    pub failure_count: u32,
    /// Consecutive passes
    pub consecutive_passes: u32,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl FlakyState {
    /// Fresh stable state
    #[must_use]
    pub fn stable(test_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            test_id: test_id.into(),
            status: FlakyStatus::Stable,
            failure_count: 0,
            consecutive_passes: 0,
            updated_at: at,
        }
    }

    /// Apply the outcome of a final attempt; returns the previous status
    /// if it changed
    pub fn apply(&mut self, passed: bool, policy: &FlakyPolicy, at: DateTime<Utc>) -> Option<FlakyStatus> {
        let previous = self.status;
        self.updated_at = at;

        if passed {
            self.failure_count = 0;
            self.consecutive_passes = self.consecutive_passes.saturating_add(1);
            match self.status {
                FlakyStatus::Suspect => self.status = FlakyStatus::Stable,
                FlakyStatus::Quarantined if self.consecutive_passes >= policy.restore_after_passes => {
                    self.status = FlakyStatus::Stable;
                }
                _ => {}
            }
        } else {
            self.consecutive_passes = 0;
            self.failure_count = self.failure_count.saturating_add(1);
            if self.failure_count >= policy.quarantine_after {
                self.status = FlakyStatus::Quarantined;
            } else if self.failure_count >= policy.suspect_after && self.status != FlakyStatus::Quarantined {
                self.status = FlakyStatus::Suspect;
            }
        }

        (previous != self.status).then_some(previous)
    }
}

/// Status change of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlakyTransition {
    /// Status before
    pub from: FlakyStatus,
    /// Status after
    pub to: FlakyStatus,
}

/// Result of recording an outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlakyUpdate {
    /// State after the outcome
    pub state: FlakyState,
    /// Status change, if any
    pub transition: Option<FlakyTransition>,
    /// Whether the state reached the durable store
    pub persisted: bool,
}

impl FlakyUpdate {
    /// Check if this update quarantined the test
    #[inline]
    #[must_use]
    pub fn quarantined(&self) -> bool {
        matches!(
            self.transition,
            Some(FlakyTransition {
                to: FlakyStatus::Quarantined,
                ..
            })
        )
    }
}

/// Per-test flaky tracker backed by the durable store
#[derive(Debug)]
pub struct FlakyTracker {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    alerts: Arc<dyn AlertSink>,
    policy: FlakyPolicy,
    states: DashMap<String, FlakyState>,
    // Serializes read-modify-write of states
    write_lock: Mutex<()>,
}

impl FlakyTracker {
    /// Create tracker
    ///
    /// # Errors
    /// Invalid policy
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        alerts: Arc<dyn AlertSink>,
        policy: FlakyPolicy,
    ) -> Result<Self, ValidationError> {
        policy.validate()?;
        Ok(Self {
            store,
            clock,
            alerts,
            policy,
            states: DashMap::new(),
            write_lock: Mutex::new(()),
        })
    }

    /// Policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &FlakyPolicy {
        &self.policy
    }

    /// Current state of `test_id`
    ///
    /// The store is authoritative, so transitions written by other
    /// instances are observed. When the store has nothing usable the last
    /// state seen in-process is returned; unknown tests are stable, which
    /// errs towards running them.
    pub async fn state(&self, test_id: &str) -> FlakyState {
        let query = RecordQuery::new().key(test_id).limit(1);
        match self.store.query(Scope::FlakyState, &query).await {
            Ok(records) => {
                let loaded = records
                    .first()
                    .and_then(|record| record.decode::<FlakyState>().ok());
                if let Some(state) = loaded {
                    self.states.insert(test_id.to_string(), state.clone());
                    return state;
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Flaky state of {} unavailable, using last known state: {}",
                    test_id,
                    e
                );
            }
        }
        self.states
            .get(test_id)
            .map(|state| state.clone())
            .unwrap_or_else(|| FlakyState::stable(test_id, self.clock.now()))
    }

    /// Record the final outcome of a run of `test`
    pub async fn record_outcome(&self, test: &GoldenTest, passed: bool) -> FlakyUpdate {
        let _guard = self.write_lock.lock().await;

        let mut state = self.state(&test.id).await;
        let now = self.clock.now();
        let transition = state
            .apply(passed, &self.policy, now)
            .map(|from| FlakyTransition { from, to: state.status });

        let persisted = match Record::new(Scope::FlakyState, &test.id, now, &state) {
            Ok(record) => match self.store.append(record).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::error!("Failed to persist flaky state of {}: {}", test.id, e);
                    false
                }
            },
            Err(e) => {
                tracing::error!("Failed to encode flaky state of {}: {}", test.id, e);
                false
            }
        };
        self.states.insert(test.id.clone(), state.clone());

        if let Some(change) = transition {
            tracing::info!(
                "Test {} flaky status {} -> {} (failures={}, passes={})",
                test.id,
                change.from.as_str(),
                change.to.as_str(),
                state.failure_count,
                state.consecutive_passes
            );
            if change.to == FlakyStatus::Quarantined {
                self.report_quarantine(test, &state).await;
            }
        }

        FlakyUpdate {
            state,
            transition,
            persisted,
        }
    }

    async fn report_quarantine(&self, test: &GoldenTest, state: &FlakyState) {
        tracing::warn!(
            "Quarantined test {} after {} consecutive failures",
            test.id,
            state.failure_count
        );
        let alert = Alert::new(
            AlertKind::TestQuarantined,
            test.severity,
            test.pattern_id.as_str(),
            format!(
                "golden test {} quarantined after {} consecutive failures",
                test.id, state.failure_count
            ),
            state.updated_at,
        )
        .with_details(serde_json::json!({
            "test_id": test.id,
            "pattern_id": test.pattern_id,
            "failure_count": state.failure_count,
        }));
        self.alerts.emit(alert).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::AccidentPattern;
    use aegis_boundary::{BroadcastAlertSink, MemoryStore};
    use aegis_types::{BlastRadius, ManualClock, Severity};
    use pretty_assertions::assert_eq;

    fn apply_all(outcomes: &[bool]) -> FlakyState {
        let policy = FlakyPolicy::default();
        let mut state = FlakyState::stable("t", Utc::now());
        for passed in outcomes {
            state.apply(*passed, &policy, Utc::now());
        }
        state
    }

    #[test]
    fn two_failures_suspect_three_quarantine() {
        assert_eq!(apply_all(&[false]).status, FlakyStatus::Stable);
        assert_eq!(apply_all(&[false, false]).status, FlakyStatus::Suspect);
        assert_eq!(apply_all(&[false, false, false]).status, FlakyStatus::Quarantined);
    }

    #[test]
    fn pass_while_suspect_resets() {
        let state = apply_all(&[false, false, true]);
        assert_eq!(state.status, FlakyStatus::Stable);
        assert_eq!(state.failure_count, 0);
    }

    #[test]
    fn failures_must_be_consecutive() {
        let state = apply_all(&[false, true, false]);
        assert_eq!(state.status, FlakyStatus::Stable);
        assert_eq!(state.failure_count, 1);
    }

    #[test]
    fn quarantine_needs_twenty_passes_to_restore() {
        let mut outcomes = vec![false, false, false];
        outcomes.extend(std::iter::repeat(true).take(19));
        let state = apply_all(&outcomes);
        assert_eq!(state.status, FlakyStatus::Quarantined);
        assert_eq!(state.consecutive_passes, 19);

        outcomes.push(true);
        assert_eq!(apply_all(&outcomes).status, FlakyStatus::Stable);
    }

    #[test]
    fn apply_reports_previous_status() {
        let policy = FlakyPolicy::default();
        let mut state = FlakyState::stable("t", Utc::now());
        assert_eq!(state.apply(false, &policy, Utc::now()), None);
        assert_eq!(state.apply(false, &policy, Utc::now()), Some(FlakyStatus::Stable));
    }

    #[test]
    fn policy_validation() {
        assert!(FlakyPolicy::default().validate().is_ok());
        let inverted = FlakyPolicy {
            suspect_after: 3,
            quarantine_after: 2,
            restore_after_passes: 20,
        };
        assert!(inverted.validate().is_err());
    }

    #[tokio::test]
    async fn tracker_persists_and_alerts_on_quarantine() {
        let store = Arc::new(MemoryStore::new());
        let alerts = Arc::new(BroadcastAlertSink::new(8));
        let mut rx = alerts.subscribe();
        let clock = Arc::new(ManualClock::starting_now());
        let tracker = FlakyTracker::new(store.clone(), clock.clone(), alerts, FlakyPolicy::default())
            .unwrap();

        let pattern = AccidentPattern::new("p1", "t", Severity::High, BlastRadius::Project);
        let test = GoldenTest::from_pattern(&pattern, 0.8, 1_000);

        tracker.record_outcome(&test, false).await;
        tracker.record_outcome(&test, false).await;
        let update = tracker.record_outcome(&test, false).await;
        assert!(update.quarantined());
        assert!(update.persisted);

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.kind, AlertKind::TestQuarantined);

        // A new tracker over the same store sees the quarantine
        let restarted = FlakyTracker::new(
            store,
            clock,
            Arc::new(BroadcastAlertSink::default()),
            FlakyPolicy::default(),
        )
        .unwrap();
        assert_eq!(restarted.state(&test.id).await.status, FlakyStatus::Quarantined);
    }

    #[tokio::test]
    async fn state_follows_transitions_from_other_trackers() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let tracker = || {
            FlakyTracker::new(
                store.clone(),
                clock.clone(),
                Arc::new(BroadcastAlertSink::default()),
                FlakyPolicy::default(),
            )
            .unwrap()
        };
        let (local, remote) = (tracker(), tracker());

        let pattern = AccidentPattern::new("p1", "t", Severity::Low, BlastRadius::Project);
        let test = GoldenTest::from_pattern(&pattern, 0.8, 1_000);

        local.record_outcome(&test, false).await;
        assert_eq!(local.state(&test.id).await.failure_count, 1);

        remote.record_outcome(&test, false).await;
        remote.record_outcome(&test, false).await;

        let seen = local.state(&test.id).await;
        assert_eq!(seen.status, FlakyStatus::Quarantined);
        assert_eq!(seen.failure_count, 3);

        // Continues from the shared state rather than its own copy
        let update = local.record_outcome(&test, true).await;
        assert_eq!(update.state.consecutive_passes, 1);
        assert_eq!(update.state.status, FlakyStatus::Quarantined);
    }
}
