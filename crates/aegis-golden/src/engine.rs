//! Golden test execution engine
//!
//! # Gate run
//!
//! ```text
//! tests (explicit | cached | selected, capped at the action's impact)
//!   └─> skip quarantined
//!        └─> run in parallel (bounded), each test:
//!              attempt 0 ─fail─> sleep d[0] ─> attempt 1 ─fail─> sleep d[1] ─> attempt 2
//!              (a pass on any attempt ends the sequence; every attempt is persisted)
//!        └─> flaky tracking on each test's final attempt
//!        └─> kill switch over the final failures
//! ```

use crate::check::{CheckContext, CheckRegistry};
use crate::error::{AttemptError, GoldenError};
use crate::flaky::{FlakyPolicy, FlakyTracker};
use crate::golden::{FlakyStatus, GoldenTest, TestExecutionResult, TestStatus};
use crate::kill_switch::{KillSwitch, KillSwitchConfig, KillSwitchDecision};
use crate::pattern::PatternCatalog;
use crate::selection::{ScoringWeights, SelectionCriteria, SelectionOutcome, TestSelector};
use aegis_boundary::{AlertSink, Record, RecordStore, Scope};
use aegis_types::{Clock, ExecutionId, Proposal, ValidationError};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Retry and parallelism settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Delay before each retry; one retry per entry
    pub retry_delays_ms: Vec<u64>,
    /// Tests run concurrently within one gate
    pub max_parallel: usize,
}

impl ExecutionConfig {
    /// Attempts per test, initial one included
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.retry_delays_ms.len() + 1
    }

    /// Validate configuration
    ///
    /// # Errors
    /// Zero parallelism
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_parallel == 0 {
            return Err(ValidationError::InvalidConfig(
                "execution.max_parallel must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            retry_delays_ms: vec![0, 5_000],
            max_parallel: 4,
        }
    }
}

/// Settings of the golden engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldenConfig {
    /// Scoring weights
    pub scoring: ScoringWeights,
    /// Selection policy
    pub selection: SelectionCriteria,
    /// Retries and parallelism
    pub execution: ExecutionConfig,
    /// Flaky thresholds
    pub flaky: FlakyPolicy,
    /// Kill switch thresholds
    pub kill_switch: KillSwitchConfig,
}

impl GoldenConfig {
    /// Validate every section
    ///
    /// # Errors
    /// First invalid section
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.scoring.validate()?;
        self.selection.validate()?;
        self.execution.validate()?;
        self.flaky.validate()?;
        self.kill_switch.validate()
    }
}

/// Outcome of one test within a gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    /// Test ID
    pub test_id: String,
    /// Final status
    pub status: TestStatus,
    /// Attempts made
    pub attempts: u32,
    /// Flaky status after this run
    pub flaky_status: FlakyStatus,
}

/// Result of a pre-execution gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    /// Gate invocation
    pub execution_id: ExecutionId,
    /// No executed test failed
    pub all_passed: bool,
    /// Every attempt, grouped by test
    pub results: Vec<TestExecutionResult>,
    /// One entry per executed test
    pub summaries: Vec<TestSummary>,
    /// Tests skipped because they are quarantined
    pub skipped_quarantined: Vec<String>,
    /// Tests quarantined by this run
    pub newly_quarantined: Vec<String>,
    /// Kill switch decision, when anything failed
    pub kill_switch: Option<KillSwitchDecision>,
}

impl GateReport {
    /// Check if the kill switch tripped
    #[inline]
    #[must_use]
    pub fn kill_switch_activated(&self) -> bool {
        self.kill_switch
            .as_ref()
            .is_some_and(KillSwitchDecision::is_activation)
    }

    /// Final results of tests that did not pass
    pub fn final_failures(&self) -> impl Iterator<Item = &TestExecutionResult> {
        self.results
            .iter()
            .filter(|r| r.is_final_attempt && r.failed())
    }
}

/// Single re-validation of a quarantined test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidationOutcome {
    /// Test ID
    pub test_id: String,
    /// Outcome of the re-validation run
    pub status: TestStatus,
    /// Consecutive passes so far
    pub consecutive_passes: u32,
    /// Whether this pass restored the test
    pub restored: bool,
}

/// Runs golden tests in front of candidate actions
#[derive(Debug)]
pub struct GoldenEngine {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    catalog: Arc<PatternCatalog>,
    checks: Arc<CheckRegistry>,
    selector: TestSelector,
    config: GoldenConfig,
    flaky: FlakyTracker,
    kill_switch: KillSwitch,
    cached: RwLock<Option<Vec<GoldenTest>>>,
}

impl GoldenEngine {
    /// Create engine
    ///
    /// # Errors
    /// Invalid configuration
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        alerts: Arc<dyn AlertSink>,
        catalog: Arc<PatternCatalog>,
        checks: Arc<CheckRegistry>,
        config: GoldenConfig,
    ) -> Result<Self, GoldenError> {
        config.validate()?;
        let selector = TestSelector::new(config.scoring)?;
        let flaky = FlakyTracker::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&alerts),
            config.flaky,
        )?;
        let kill_switch = KillSwitch::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            alerts,
            config.kill_switch,
        )?;

        Ok(Self {
            store,
            clock,
            catalog,
            checks,
            selector,
            config,
            flaky,
            kill_switch,
            cached: RwLock::new(None),
        })
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GoldenConfig {
        &self.config
    }

    /// Pattern catalog
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Arc<PatternCatalog> {
        &self.catalog
    }

    /// Kill switch
    #[inline]
    #[must_use]
    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    /// Flaky tracker
    #[inline]
    #[must_use]
    pub fn flaky(&self) -> &FlakyTracker {
        &self.flaky
    }

    /// Select tests from the catalog and cache the selection
    #[must_use]
    pub fn select_tests(&self) -> SelectionOutcome {
        let outcome = self
            .selector
            .select(&self.catalog.snapshot(), &self.config.selection);
        *self.cached.write() = Some(outcome.selected.clone());
        tracing::info!(
            "Selected {} golden tests ({} rejected)",
            outcome.selected.len(),
            outcome.rejected.len()
        );
        outcome
    }

    /// Replace the cached test set
    pub fn set_cached_tests(&self, tests: Vec<GoldenTest>) {
        *self.cached.write() = Some(tests);
    }

    /// Drop the cached test set; the next gate selects afresh
    pub fn clear_cached_tests(&self) {
        *self.cached.write() = None;
    }

    /// Cached test set, if any
    #[must_use]
    pub fn cached_tests(&self) -> Option<Vec<GoldenTest>> {
        self.cached.read().clone()
    }

    /// Tests an action must pass when none are given explicitly
    fn default_tests(&self, action: &Proposal) -> Vec<GoldenTest> {
        let ceiling = action.impact.severity_ceiling();
        let tests = match self.cached_tests() {
            Some(tests) => tests,
            None => self.select_tests().selected,
        };
        tests.into_iter().filter(|t| t.severity <= ceiling).collect()
    }

    /// Run the pre-execution gate for `action`
    ///
    /// Test failures are captured per test and never abort the run.
    ///
    /// # Errors
    /// `GoldenError::Validation` for a malformed proposal
    pub async fn run_pre_execution_gate(
        &self,
        action: &Proposal,
        explicit_tests: Option<Vec<GoldenTest>>,
    ) -> Result<GateReport, GoldenError> {
        action.validate()?;
        let execution_id = ExecutionId::new();
        let candidates = match explicit_tests {
            Some(tests) => tests,
            None => self.default_tests(action),
        };

        let mut seen = HashSet::new();
        let mut runnable = Vec::new();
        let mut skipped_quarantined = Vec::new();
        for test in candidates {
            if !seen.insert(test.id.clone()) {
                continue;
            }
            let state = self.flaky.state(&test.id).await;
            let test = test.with_flaky_state(&state);
            if test.is_quarantined() {
                tracing::debug!("Skipping quarantined test {}", test.id);
                skipped_quarantined.push(test.id);
            } else {
                runnable.push(test);
            }
        }

        if runnable.is_empty() {
            tracing::warn!("Gate {} for {} ran no golden tests", execution_id, action.id);
        }

        let runs: Vec<(GoldenTest, Vec<TestExecutionResult>)> = stream::iter(runnable)
            .map(|test| async move {
                let attempts = self.run_test(action, &test, execution_id).await;
                (test, attempts)
            })
            .buffered(self.config.execution.max_parallel)
            .collect()
            .await;

        let mut results = Vec::new();
        let mut summaries = Vec::with_capacity(runs.len());
        let mut newly_quarantined = Vec::new();
        let mut final_failures = Vec::new();

        for (test, attempts) in runs {
            let Some(last) = attempts.last().cloned() else {
                continue;
            };
            let update = self.flaky.record_outcome(&test, last.status.is_pass()).await;
            if update.quarantined() {
                newly_quarantined.push(test.id.clone());
            }
            summaries.push(TestSummary {
                test_id: test.id.clone(),
                status: last.status,
                attempts: u32::try_from(attempts.len()).unwrap_or(u32::MAX),
                flaky_status: update.state.status,
            });
            if last.failed() {
                final_failures.push(last);
            }
            results.extend(attempts);
        }

        let kill_switch = self
            .kill_switch
            .evaluate(&action.scope, execution_id, &final_failures)
            .await;

        tracing::info!(
            "Gate {} for {}: {}/{} tests passed, {} quarantined skipped",
            execution_id,
            action.id,
            summaries.len() - final_failures.len(),
            summaries.len(),
            skipped_quarantined.len()
        );

        Ok(GateReport {
            execution_id,
            all_passed: final_failures.is_empty(),
            results,
            summaries,
            skipped_quarantined,
            newly_quarantined,
            kill_switch,
        })
    }

    /// Run one test through its retry sequence
    async fn run_test(
        &self,
        action: &Proposal,
        test: &GoldenTest,
        execution_id: ExecutionId,
    ) -> Vec<TestExecutionResult> {
        let attempts = self.config.execution.attempts();
        let delays = std::iter::once(0).chain(self.config.execution.retry_delays_ms.iter().copied());
        let mut results = Vec::with_capacity(attempts);

        for (index, delay_ms) in delays.enumerate() {
            if index > 0 && delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            let attempt = u32::try_from(index).unwrap_or(u32::MAX);
            let executed_at = self.clock.now();
            let (outcome, elapsed) = self.attempt(action, test, attempt, execution_id).await;

            let status = match &outcome {
                Ok(()) => TestStatus::Passed,
                Err(AttemptError::Timeout { .. }) => TestStatus::Timeout,
                Err(_) => TestStatus::Failed,
            };
            let result = TestExecutionResult {
                test_id: test.id.clone(),
                execution_id,
                scope: action.scope.clone(),
                severity: test.severity,
                executed_at,
                duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                status,
                retry_attempt: attempt,
                is_final_attempt: status.is_pass() || index + 1 == attempts,
                revalidation: false,
                error: outcome.err().map(|e| e.to_string()),
            };
            if !result.status.is_pass() {
                tracing::debug!(
                    "Test {} attempt {}/{} {:?}: {}",
                    test.id,
                    index + 1,
                    attempts,
                    result.status,
                    result.error.as_deref().unwrap_or_default()
                );
            }
            self.persist_attempt(&result).await;

            let done = result.is_final_attempt;
            results.push(result);
            if done {
                break;
            }
        }

        results
    }

    /// One bounded attempt; a panic or overrun is a non-pass
    async fn attempt(
        &self,
        action: &Proposal,
        test: &GoldenTest,
        attempt: u32,
        execution_id: ExecutionId,
    ) -> (Result<(), AttemptError>, Duration) {
        let check = self.checks.resolve(&test.check_id);
        let ctx = CheckContext {
            action,
            test,
            attempt,
            execution_id,
        };
        let limit = test.timeout();
        let timeout = AttemptError::Timeout {
            limit_ms: test.timeout_ms,
        };

        let started = tokio::time::Instant::now();
        let outcome = tokio::time::timeout(limit, AssertUnwindSafe(check.run(&ctx)).catch_unwind()).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Err(_) => Err(timeout),
            Ok(Err(panic)) => Err(AttemptError::Panicked(panic_message(panic.as_ref()))),
            Ok(Ok(_)) if elapsed > limit => Err(timeout),
            Ok(Ok(Err(failure))) => Err(AttemptError::Check(failure)),
            Ok(Ok(Ok(()))) => Ok(()),
        };
        (result, elapsed)
    }

    async fn persist_attempt(&self, result: &TestExecutionResult) {
        let written = match Record::new(Scope::ExecutionResults, &result.test_id, result.executed_at, result) {
            Ok(record) => self.store.append(record).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(
                "Failed to persist attempt {} of {}: {}",
                result.retry_attempt,
                result.test_id,
                e
            );
        }
    }

    /// Run each quarantined test in `tests` once against `target`
    ///
    /// This is the periodic validation path; passes accumulate towards
    /// restoring the test. Non-quarantined tests are ignored.
    ///
    /// # Errors
    /// `GoldenError::Validation` for a malformed target
    pub async fn revalidate(
        &self,
        tests: &[GoldenTest],
        target: &Proposal,
    ) -> Result<Vec<RevalidationOutcome>, GoldenError> {
        target.validate()?;
        let execution_id = ExecutionId::new();
        let mut outcomes = Vec::new();

        for test in tests {
            let state = self.flaky.state(&test.id).await;
            if state.status != FlakyStatus::Quarantined {
                continue;
            }
            let test = test.clone().with_flaky_state(&state);

            let executed_at = self.clock.now();
            let (outcome, elapsed) = self.attempt(target, &test, 0, execution_id).await;
            let status = match &outcome {
                Ok(()) => TestStatus::Passed,
                Err(AttemptError::Timeout { .. }) => TestStatus::Timeout,
                Err(_) => TestStatus::Failed,
            };
            self.persist_attempt(&TestExecutionResult {
                test_id: test.id.clone(),
                execution_id,
                scope: target.scope.clone(),
                severity: test.severity,
                executed_at,
                duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                status,
                retry_attempt: 0,
                is_final_attempt: true,
                revalidation: true,
                error: outcome.err().map(|e| e.to_string()),
            })
            .await;

            let update = self.flaky.record_outcome(&test, status.is_pass()).await;
            let restored = update.state.status == FlakyStatus::Stable;
            if restored {
                tracing::info!("Restored test {} after re-validation", test.id);
            }
            outcomes.push(RevalidationOutcome {
                test_id: test.id.clone(),
                status,
                consecutive_passes: update.state.consecutive_passes,
                restored,
            });
        }

        Ok(outcomes)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckFailure;
    use crate::pattern::AccidentPattern;
    use aegis_boundary::{MemoryStore, RecordQuery, TracingAlertSink};
    use aegis_types::{BlastRadius, Impact, ManualClock, Severity, TaskType};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn engine_with(checks: CheckRegistry, patterns: Vec<AccidentPattern>) -> (GoldenEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = GoldenEngine::new(
            store.clone(),
            Arc::new(ManualClock::starting_now()),
            Arc::new(TracingAlertSink),
            Arc::new(PatternCatalog::from_patterns(patterns).unwrap()),
            Arc::new(checks),
            GoldenConfig::default(),
        )
        .unwrap();
        (engine, store)
    }

    fn test_for(id: &str, severity: Severity) -> GoldenTest {
        let pattern = AccidentPattern::new(id, id, severity, BlastRadius::Project);
        GoldenTest::from_pattern(&pattern, 0.9, 1_000)
    }

    fn action(impact: Impact) -> Proposal {
        Proposal::new("a1", 0.95, impact, TaskType::Maintenance, "repo")
    }

    #[tokio::test(start_paused = true)]
    async fn pass_on_first_attempt_is_final() {
        let (engine, store) = engine_with(CheckRegistry::new(), vec![]);
        let report = engine
            .run_pre_execution_gate(&action(Impact::Low), Some(vec![test_for("p1", Severity::High)]))
            .await
            .unwrap();

        assert!(report.all_passed);
        assert_eq!(report.results.len(), 1);
        assert!(report.results[0].is_final_attempt);
        assert!(report.kill_switch.is_none());
        assert_eq!(store.len(), 2); // attempt + flaky state
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_pass_with_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut checks = CheckRegistry::new();
        checks.register_fn("p1", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CheckFailure::new("not yet"))
            } else {
                Ok(())
            }
        });
        let (engine, _) = engine_with(checks, vec![]);

        let started = tokio::time::Instant::now();
        let report = engine
            .run_pre_execution_gate(&action(Impact::Low), Some(vec![test_for("p1", Severity::Medium)]))
            .await
            .unwrap();

        assert!(report.all_passed);
        let attempts: Vec<_> = report.results.iter().map(|r| (r.retry_attempt, r.is_final_attempt)).collect();
        assert_eq!(attempts, vec![(0, false), (1, false), (2, true)]);
        assert!(started.elapsed() >= Duration::from_millis(5_000));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_check_times_out() {
        #[derive(Debug)]
        struct Slow;

        #[async_trait::async_trait]
        impl crate::check::GoldenCheck for Slow {
            async fn run(&self, _ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let mut checks = CheckRegistry::new();
        checks.register("p1", Arc::new(Slow));
        let (engine, _) = engine_with(checks, vec![]);

        let report = engine
            .run_pre_execution_gate(&action(Impact::Low), Some(vec![test_for("p1", Severity::Low)]))
            .await
            .unwrap();

        assert!(!report.all_passed);
        assert_eq!(report.results.len(), 3);
        assert!(report.results.iter().all(|r| r.status == TestStatus::Timeout));
        assert!(report.results[2].is_final_attempt);
        assert_eq!(report.summaries[0].attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_check_counts_as_failure() {
        let mut checks = CheckRegistry::new();
        checks.register_fn("p1", |_| panic!("check exploded"));
        let (engine, _) = engine_with(checks, vec![]);

        let report = engine
            .run_pre_execution_gate(&action(Impact::Low), Some(vec![test_for("p1", Severity::Low)]))
            .await
            .unwrap();

        let last = report.results.last().unwrap();
        assert_eq!(last.status, TestStatus::Failed);
        assert!(last.error.as_deref().unwrap().contains("check exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn selected_tests_are_capped_by_impact() {
        let patterns = vec![
            AccidentPattern::new("crit", "c", Severity::Critical, BlastRadius::System),
            AccidentPattern::new("med", "m", Severity::Medium, BlastRadius::System).with_occurrences(1),
        ];
        let mut checks = CheckRegistry::new();
        checks.register_fn("crit", |_| Err(CheckFailure::new("would fail")));
        let (engine, _) = engine_with(checks, patterns);

        let report = engine
            .run_pre_execution_gate(&action(Impact::Medium), None)
            .await
            .unwrap();
        let ran: Vec<_> = report.summaries.iter().map(|s| s.test_id.as_str()).collect();
        assert_eq!(ran, vec!["golden-med"]);
        assert!(report.all_passed);
        assert!(engine.cached_tests().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn quarantined_tests_are_skipped() {
        let mut checks = CheckRegistry::new();
        checks.register_fn("p1", |_| Err(CheckFailure::new("always")));
        let (engine, _) = engine_with(checks, vec![]);
        let tests = vec![test_for("p1", Severity::Low)];

        for _ in 0..3 {
            engine
                .run_pre_execution_gate(&action(Impact::Low), Some(tests.clone()))
                .await
                .unwrap();
        }
        let report = engine
            .run_pre_execution_gate(&action(Impact::Low), Some(tests))
            .await
            .unwrap();
        assert_eq!(report.skipped_quarantined, vec!["golden-p1".to_string()]);
        assert!(report.results.is_empty());
        assert!(report.all_passed);
    }

    #[tokio::test(start_paused = true)]
    async fn every_attempt_is_persisted() {
        let mut checks = CheckRegistry::new();
        checks.register_fn("p1", |_| Err(CheckFailure::new("always")));
        let (engine, store) = engine_with(checks, vec![]);

        engine
            .run_pre_execution_gate(&action(Impact::Low), Some(vec![test_for("p1", Severity::Low)]))
            .await
            .unwrap();

        let persisted = store
            .query(Scope::ExecutionResults, &RecordQuery::new().key("golden-p1"))
            .await
            .unwrap();
        assert_eq!(persisted.len(), 3);
        let finals = persisted
            .iter()
            .filter(|r| r.field("is_final_attempt") == Some(&serde_json::Value::Bool(true)))
            .count();
        assert_eq!(finals, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_follow_configuration() {
        let store = Arc::new(MemoryStore::new());
        let config = GoldenConfig {
            execution: ExecutionConfig {
                retry_delays_ms: vec![],
                max_parallel: 1,
            },
            ..GoldenConfig::default()
        };
        let mut checks = CheckRegistry::new();
        checks.register_fn("p1", |_| Err(CheckFailure::new("always")));
        let engine = GoldenEngine::new(
            store,
            Arc::new(ManualClock::starting_now()),
            Arc::new(TracingAlertSink),
            Arc::new(PatternCatalog::new()),
            Arc::new(checks),
            config,
        )
        .unwrap();

        let report = engine
            .run_pre_execution_gate(&action(Impact::Low), Some(vec![test_for("p1", Severity::Low)]))
            .await
            .unwrap();
        assert_eq!(report.results.len(), 1);
        assert!(report.results[0].is_final_attempt);
    }

    #[test]
    fn config_validation() {
        assert!(GoldenConfig::default().validate().is_ok());
        let bad = GoldenConfig {
            execution: ExecutionConfig {
                retry_delays_ms: vec![0],
                max_parallel: 0,
            },
            ..GoldenConfig::default()
        };
        assert!(bad.validate().is_err());
        assert_eq!(ExecutionConfig::default().attempts(), 3);
    }
}
