//! Kill switch
//!
//! Severity- and time-windowed circuit breaker evaluated once per gate run
//! over the tests that failed in that run.
//!
//! | Severity | Trips when                         |
//! |----------|------------------------------------|
//! | critical | first failure                      |
//! | high     | 2 failures within 5 minutes        |
//! | medium   | 3 failures within 5 minutes        |
//! | low      | never; warning only                |
//!
//! Every decision is appended to the `kill_switch` scope. An activation is
//! also recorded in-process before `evaluate` returns, so it blocks the
//! scope even when the store is down.

use crate::golden::TestExecutionResult;
use aegis_boundary::{Alert, AlertKind, AlertSink, Record, RecordQuery, RecordStore, Scope, StoreError};
use aegis_types::{Clock, ExecutionId, Severity, ValidationError};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Trip condition for one severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Failures within the window that trip the switch
    pub failures: u32,
    /// Window length in minutes
    pub window_mins: u32,
    /// Only ever warn
    #[serde(default)]
    pub warning_only: bool,
}

impl SeverityThreshold {
    /// Trip after `failures` within `window_mins`
    #[inline]
    #[must_use]
    pub const fn trips_after(failures: u32, window_mins: u32) -> Self {
        Self {
            failures,
            window_mins,
            warning_only: false,
        }
    }

    /// Never trip
    #[inline]
    #[must_use]
    pub const fn warning() -> Self {
        Self {
            failures: 1,
            window_mins: 0,
            warning_only: true,
        }
    }

    fn window(&self) -> Duration {
        Duration::minutes(i64::from(self.window_mins))
    }
}

/// Thresholds per severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KillSwitchConfig {
    /// Critical failures
    pub critical: SeverityThreshold,
    /// High failures
    pub high: SeverityThreshold,
    /// Medium failures
    pub medium: SeverityThreshold,
    /// Low failures
    pub low: SeverityThreshold,
}

impl KillSwitchConfig {
    /// Threshold for a severity
    #[inline]
    #[must_use]
    pub fn threshold(&self, severity: Severity) -> SeverityThreshold {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// Validate thresholds
    ///
    /// # Errors
    /// A zero failure count
    pub fn validate(&self) -> Result<(), ValidationError> {
        for severity in Severity::ALL {
            if self.threshold(severity).failures == 0 {
                return Err(ValidationError::InvalidConfig(format!(
                    "kill_switch.{severity}.failures must be positive"
                )));
            }
        }
        Ok(())
    }
}

impl Default for KillSwitchConfig {
    fn default() -> Self {
        Self {
            critical: SeverityThreshold::trips_after(1, 0),
            high: SeverityThreshold::trips_after(2, 5),
            medium: SeverityThreshold::trips_after(3, 5),
            low: SeverityThreshold::warning(),
        }
    }
}

/// What the switch decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillSwitchAction {
    /// Halt autonomous execution in the scope
    Activate,
    /// Not enough failures yet
    Delay,
    /// Report only
    WarningOnly,
}

/// Persisted kill switch decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitchDecision {
    /// Gate invocation that produced the failures
    pub execution_id: ExecutionId,
    /// Affected scope
    pub scope: String,
    /// Highest failing severity
    pub severity: Severity,
    /// Decision
    pub action: KillSwitchAction,
    /// Failures counted in the window, including this run
    pub failure_count: u32,
    /// Failures required to trip
    pub threshold: u32,
    /// Window length in minutes
    pub window_mins: u32,
    /// Start of the counting window
    pub window_start: DateTime<Utc>,
    /// Failing tests of this run at `severity`
    pub failing_tests: Vec<String>,
    /// When the decision was made
    pub decided_at: DateTime<Utc>,
}

impl KillSwitchDecision {
    /// Check if the decision halts execution
    #[inline]
    #[must_use]
    pub fn is_activation(&self) -> bool {
        self.action == KillSwitchAction::Activate
    }
}

/// Entry of the kill switch audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum KillSwitchEntry {
    /// Evaluation outcome
    Decision(KillSwitchDecision),
    /// Manual clear
    Cleared {
        /// Scope cleared
        scope: String,
        /// Who cleared it
        operator: String,
        /// When
        cleared_at: DateTime<Utc>,
    },
}

/// Circuit breaker over golden test failures
#[derive(Debug)]
pub struct KillSwitch {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    alerts: Arc<dyn AlertSink>,
    config: KillSwitchConfig,
    /// Scopes activated by this instance, with activation time
    engaged: DashMap<String, DateTime<Utc>>,
}

impl KillSwitch {
    /// Create kill switch
    ///
    /// # Errors
    /// Invalid configuration
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        alerts: Arc<dyn AlertSink>,
        config: KillSwitchConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            alerts,
            config,
            engaged: DashMap::new(),
        })
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &KillSwitchConfig {
        &self.config
    }

    /// Decide over the final failed results of one gate run
    ///
    /// Returns `None` when nothing failed. Window counts come from the
    /// persisted `execution_results` of the same scope, excluding
    /// re-validation runs; results of `execution_id` itself are counted
    /// from `failures` only, never twice. A failing window query counts as
    /// zero prior failures.
    pub async fn evaluate(
        &self,
        scope: &str,
        execution_id: ExecutionId,
        failures: &[TestExecutionResult],
    ) -> Option<KillSwitchDecision> {
        let severity = failures.iter().map(|r| r.severity).max()?;
        let threshold = self.config.threshold(severity);
        let now = self.clock.now();
        let window_start = now - threshold.window();

        let failing_tests: Vec<String> = failures
            .iter()
            .filter(|r| r.severity == severity)
            .map(|r| r.test_id.clone())
            .collect();
        let current = u32::try_from(failing_tests.len()).unwrap_or(u32::MAX);
        let prior = if threshold.window_mins == 0 {
            0
        } else {
            self.prior_failures(scope, severity, execution_id, window_start)
                .await
        };
        let failure_count = current.saturating_add(prior);

        let action = if severity == Severity::Critical {
            KillSwitchAction::Activate
        } else if threshold.warning_only {
            KillSwitchAction::WarningOnly
        } else if failure_count >= threshold.failures {
            KillSwitchAction::Activate
        } else {
            KillSwitchAction::Delay
        };

        let decision = KillSwitchDecision {
            execution_id,
            scope: scope.to_string(),
            severity,
            action,
            failure_count,
            threshold: threshold.failures,
            window_mins: threshold.window_mins,
            window_start,
            failing_tests,
            decided_at: now,
        };

        if decision.is_activation() {
            self.engaged.insert(scope.to_string(), now);
        }
        self.persist(scope, now, KillSwitchEntry::Decision(decision.clone()))
            .await;
        self.announce(&decision).await;
        Some(decision)
    }

    async fn prior_failures(
        &self,
        scope: &str,
        severity: Severity,
        execution_id: ExecutionId,
        since: DateTime<Utc>,
    ) -> u32 {
        let query = RecordQuery::new()
            .field("scope", scope)
            .field("severity", severity.as_str())
            .field("is_final_attempt", true)
            .field("revalidation", false)
            .since(since);
        match self.store.query(Scope::ExecutionResults, &query).await {
            Ok(records) => {
                let count = records
                    .iter()
                    .filter_map(|record| record.decode::<TestExecutionResult>().ok())
                    .filter(|result| result.failed() && result.execution_id != execution_id)
                    .count();
                u32::try_from(count).unwrap_or(u32::MAX)
            }
            Err(e) => {
                tracing::warn!(
                    "Kill switch window query for {} failed, counting zero prior failures: {}",
                    severity,
                    e
                );
                0
            }
        }
    }

    async fn persist(&self, scope: &str, at: DateTime<Utc>, entry: KillSwitchEntry) {
        let written = match Record::new(Scope::KillSwitch, scope, at, &entry) {
            Ok(record) => self.store.append(record).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::error!("Failed to persist kill switch entry for {}: {}", scope, e);
        }
    }

    async fn announce(&self, decision: &KillSwitchDecision) {
        let (kind, message) = match decision.action {
            KillSwitchAction::Activate => {
                tracing::error!(
                    "Kill switch ACTIVATED for {}: {} {} failure(s) within {}m",
                    decision.scope,
                    decision.failure_count,
                    decision.severity,
                    decision.window_mins
                );
                (
                    AlertKind::KillSwitchActivated,
                    format!(
                        "autonomous execution halted in '{}' after {} {} golden test failure(s)",
                        decision.scope, decision.failure_count, decision.severity
                    ),
                )
            }
            KillSwitchAction::WarningOnly => {
                tracing::warn!(
                    "Kill switch warning for {}: {} failure(s)",
                    decision.scope,
                    decision.failure_count
                );
                (
                    AlertKind::KillSwitchWarning,
                    format!(
                        "{} low-severity golden test failure(s) in '{}'",
                        decision.failure_count, decision.scope
                    ),
                )
            }
            KillSwitchAction::Delay => {
                tracing::info!(
                    "Kill switch delayed for {}: {}/{} {} failure(s)",
                    decision.scope,
                    decision.failure_count,
                    decision.threshold,
                    decision.severity
                );
                return;
            }
        };

        let details = serde_json::to_value(decision).unwrap_or_default();
        self.alerts
            .emit(
                Alert::new(kind, decision.severity, &decision.scope, message, decision.decided_at)
                    .with_details(details),
            )
            .await;
    }

    /// Whether autonomous execution is halted in `scope`
    ///
    /// The most recent activation or clear for the scope wins. An
    /// activation known only in-process still counts.
    ///
    /// # Errors
    /// Store failure while no in-process activation is known
    pub async fn is_engaged(&self, scope: &str) -> Result<bool, StoreError> {
        let local = self.engaged.get(scope).map(|at| *at);

        let latest = match self.latest_state_change(scope).await {
            Ok(latest) => latest,
            Err(e) if local.is_some() => {
                tracing::warn!("Kill switch history for {} unavailable: {}", scope, e);
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        match latest {
            Some(KillSwitchEntry::Decision(_)) => Ok(true),
            Some(KillSwitchEntry::Cleared { cleared_at, .. }) => {
                if local.is_some_and(|activated| activated > cleared_at) {
                    Ok(true)
                } else {
                    self.engaged.remove(scope);
                    Ok(false)
                }
            }
            None => Ok(local.is_some()),
        }
    }

    /// Newest activation or clear for `scope`
    async fn latest_state_change(&self, scope: &str) -> Result<Option<KillSwitchEntry>, StoreError> {
        let records = self
            .store
            .query(Scope::KillSwitch, &RecordQuery::new().key(scope))
            .await?;
        Ok(records
            .iter()
            .filter_map(|record| record.decode::<KillSwitchEntry>().ok())
            .find(|entry| match entry {
                KillSwitchEntry::Decision(decision) => decision.is_activation(),
                KillSwitchEntry::Cleared { .. } => true,
            }))
    }

    /// Manually clear the switch for `scope`
    ///
    /// The clear is persisted before the scope is released.
    ///
    /// # Errors
    /// Store failure; the scope stays engaged
    pub async fn clear(&self, scope: &str, operator: &str) -> Result<(), StoreError> {
        let now = self.clock.now();
        let entry = KillSwitchEntry::Cleared {
            scope: scope.to_string(),
            operator: operator.to_string(),
            cleared_at: now,
        };
        self.store
            .append(Record::new(Scope::KillSwitch, scope, now, &entry)?)
            .await?;
        self.engaged.remove(scope);
        tracing::info!("Kill switch for {} cleared by {}", scope, operator);
        Ok(())
    }

    /// Audit trail for `scope`, newest first
    ///
    /// # Errors
    /// Store failure
    pub async fn history(&self, scope: &str) -> Result<Vec<KillSwitchEntry>, StoreError> {
        let records = self
            .store
            .query(Scope::KillSwitch, &RecordQuery::new().key(scope))
            .await?;
        records.iter().map(Record::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::golden::TestStatus;
    use aegis_boundary::{MemoryStore, TracingAlertSink};
    use aegis_types::ManualClock;

    fn failure(test_id: &str, severity: Severity, execution_id: ExecutionId, at: DateTime<Utc>) -> TestExecutionResult {
        TestExecutionResult {
            test_id: test_id.to_string(),
            execution_id,
            scope: "repo".into(),
            severity,
            executed_at: at,
            duration_ms: 5,
            status: TestStatus::Failed,
            retry_attempt: 2,
            is_final_attempt: true,
            revalidation: false,
            error: Some("boom".into()),
        }
    }

    fn switch() -> (KillSwitch, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let ks = KillSwitch::new(
            store.clone(),
            clock.clone(),
            Arc::new(TracingAlertSink),
            KillSwitchConfig::default(),
        )
        .unwrap();
        (ks, store, clock)
    }

    async fn persist_result(store: &MemoryStore, result: &TestExecutionResult) {
        let record = Record::new(Scope::ExecutionResults, &result.test_id, result.executed_at, result).unwrap();
        store.append(record).await.unwrap();
    }

    #[tokio::test]
    async fn nothing_failed_means_no_decision() {
        let (ks, _, _) = switch();
        assert!(ks.evaluate("repo", ExecutionId::new(), &[]).await.is_none());
    }

    #[tokio::test]
    async fn single_critical_activates() {
        let (ks, _, clock) = switch();
        let run = ExecutionId::new();
        let decision = ks
            .evaluate("repo", run, &[failure("t1", Severity::Critical, run, clock.now())])
            .await
            .unwrap();
        assert_eq!(decision.action, KillSwitchAction::Activate);
        assert!(ks.is_engaged("repo").await.unwrap());
        assert!(!ks.is_engaged("other").await.unwrap());
    }

    #[tokio::test]
    async fn highest_severity_drives_decision() {
        let (ks, _, clock) = switch();
        let run = ExecutionId::new();
        let decision = ks
            .evaluate(
                "repo",
                run,
                &[
                    failure("low", Severity::Low, run, clock.now()),
                    failure("high", Severity::High, run, clock.now()),
                ],
            )
            .await
            .unwrap();
        assert_eq!(decision.severity, Severity::High);
        assert_eq!(decision.action, KillSwitchAction::Delay);
        assert_eq!(decision.failing_tests, vec!["high".to_string()]);
    }

    #[tokio::test]
    async fn current_run_is_not_double_counted() {
        let (ks, store, clock) = switch();
        let run = ExecutionId::new();
        let result = failure("t1", Severity::High, run, clock.now());
        // The engine persists attempts before evaluating
        persist_result(&store, &result).await;

        let decision = ks.evaluate("repo", run, &[result]).await.unwrap();
        assert_eq!(decision.failure_count, 1);
        assert_eq!(decision.action, KillSwitchAction::Delay);
    }

    #[tokio::test]
    async fn window_excludes_old_failures() {
        let (ks, store, clock) = switch();
        let earlier = ExecutionId::new();
        persist_result(&store, &failure("t1", Severity::High, earlier, clock.now())).await;

        clock.advance(Duration::minutes(6));
        let run = ExecutionId::new();
        let decision = ks
            .evaluate("repo", run, &[failure("t1", Severity::High, run, clock.now())])
            .await
            .unwrap();
        assert_eq!(decision.action, KillSwitchAction::Delay);
    }

    #[tokio::test]
    async fn failures_in_other_scopes_are_not_counted() {
        let (ks, store, clock) = switch();
        let elsewhere = TestExecutionResult {
            scope: "other".into(),
            ..failure("t1", Severity::High, ExecutionId::new(), clock.now())
        };
        persist_result(&store, &elsewhere).await;

        let run = ExecutionId::new();
        let decision = ks
            .evaluate("repo", run, &[failure("t1", Severity::High, run, clock.now())])
            .await
            .unwrap();
        assert_eq!(decision.failure_count, 1);
        assert_eq!(decision.action, KillSwitchAction::Delay);
        assert!(!ks.is_engaged("repo").await.unwrap());
    }

    #[tokio::test]
    async fn revalidation_failures_are_not_counted() {
        let (ks, store, clock) = switch();
        let retry = TestExecutionResult {
            revalidation: true,
            retry_attempt: 0,
            ..failure("quarantined", Severity::High, ExecutionId::new(), clock.now())
        };
        persist_result(&store, &retry).await;

        let run = ExecutionId::new();
        let decision = ks
            .evaluate("repo", run, &[failure("t2", Severity::High, run, clock.now())])
            .await
            .unwrap();
        assert_eq!(decision.failure_count, 1);
        assert_eq!(decision.action, KillSwitchAction::Delay);
    }

    #[tokio::test]
    async fn low_severity_only_warns() {
        let (ks, _, clock) = switch();
        let run = ExecutionId::new();
        let failures: Vec<_> = (0..5)
            .map(|i| failure(&format!("t{i}"), Severity::Low, run, clock.now()))
            .collect();
        let decision = ks.evaluate("repo", run, &failures).await.unwrap();
        assert_eq!(decision.action, KillSwitchAction::WarningOnly);
        assert!(!ks.is_engaged("repo").await.unwrap());
    }

    #[tokio::test]
    async fn clear_releases_scope_and_is_audited() {
        let (ks, _, clock) = switch();
        let run = ExecutionId::new();
        ks.evaluate("repo", run, &[failure("t1", Severity::Critical, run, clock.now())])
            .await;
        clock.advance(Duration::seconds(1));

        ks.clear("repo", "oncall").await.unwrap();
        assert!(!ks.is_engaged("repo").await.unwrap());

        let history = ks.history("repo").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(matches!(history[0], KillSwitchEntry::Cleared { .. }));
    }

    #[tokio::test]
    async fn activation_visible_to_new_instance() {
        let (ks, store, clock) = switch();
        let run = ExecutionId::new();
        ks.evaluate("repo", run, &[failure("t1", Severity::Critical, run, clock.now())])
            .await;

        let other = KillSwitch::new(store, clock, Arc::new(TracingAlertSink), KillSwitchConfig::default())
            .unwrap();
        assert!(other.is_engaged("repo").await.unwrap());
    }
}
