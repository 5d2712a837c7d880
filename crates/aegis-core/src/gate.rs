//! Safety gate pipeline
//!
//! ```text
//!  proposal ──► validate ──► kill switch engaged? ──► route
//!                                  │ yes                │
//!                                  ▼                    ▼
//!                               blocked          ledger claim ──► duplicate ──► blocked
//!                                                       │ accepted
//!                                                       ▼
//!                                             pre-execution gate
//!                                                       │
//!                        failures / kill switch ◄───────┴───────► all passed
//!                                 │                                    │
//!                                 ▼                                    ▼
//!                              blocked                 proceed / awaiting review / red team
//! ```
//!
//! Every error path fails closed: `evaluate` returns an error and the
//! caller must not execute the action. An accepted claim is kept even when
//! the golden tests then block the action.

use crate::config::GateConfig;
use crate::error::GateError;
use aegis_boundary::{AlertSink, MemoryStore, RecordStore, TracingAlertSink};
use aegis_coverage::{CoverageReport, CoverageTracker};
use aegis_golden::{
    AccidentPattern, CheckRegistry, GateReport, GoldenEngine, GoldenTest, KillSwitch,
    PatternCatalog,
};
use aegis_ledger::{ActionLedger, ActionRecord, CleanupHandle};
use aegis_router::{ConfidenceRouter, RoutingDecision, RoutingResult};
use aegis_types::{Clock, Proposal, ProposalId, Severity, SystemClock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Why an action was stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    /// Kill switch was already engaged for the scope
    KillSwitchEngaged {
        /// Halted scope
        scope: String,
    },
    /// Same action already claimed within the TTL
    Duplicate {
        /// Dedupe key
        dedupe_key: String,
        /// First claim
        first_seen: DateTime<Utc>,
    },
    /// This run tripped the kill switch
    KillSwitchActivated {
        /// Severity that tripped
        severity: Severity,
    },
    /// Golden tests failed
    GoldenTestsFailed {
        /// Failing test IDs
        failed: Vec<String>,
    },
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KillSwitchEngaged { scope } => write!(f, "kill switch engaged for {scope}"),
            Self::Duplicate {
                dedupe_key,
                first_seen,
            } => write!(f, "duplicate of {dedupe_key} first seen {first_seen}"),
            Self::KillSwitchActivated { severity } => {
                write!(f, "kill switch activated by {severity} failures")
            }
            Self::GoldenTestsFailed { failed } => {
                write!(f, "golden tests failed: {}", failed.join(", "))
            }
        }
    }
}

/// What happens to the action next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    /// Execute autonomously
    Proceed,
    /// Hold for human approval
    AwaitingReview,
    /// Hold for adversarial review
    AwaitingRedTeam,
    /// Do not execute
    Blocked(BlockReason),
}

impl Disposition {
    /// Check if the action may execute now
    #[inline]
    #[must_use]
    pub fn may_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    /// Check if the action was blocked
    #[inline]
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    fn from_routing(decision: RoutingDecision) -> Self {
        match decision {
            RoutingDecision::AutoApprove => Self::Proceed,
            RoutingDecision::ReviewRequired => Self::AwaitingReview,
            RoutingDecision::RedTeamRequired => Self::AwaitingRedTeam,
        }
    }
}

/// Outcome of one gate evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Evaluated proposal
    pub proposal_id: ProposalId,
    /// Next step
    pub disposition: Disposition,
    /// Router outcome; absent when refused before routing
    pub routing: Option<RoutingResult>,
    /// Ledger claim; the winner's record for duplicates
    pub claim: Option<ActionRecord>,
    /// Golden test report; absent when refused before testing
    pub report: Option<GateReport>,
}

/// Handle to the periodic coverage task; aborts the task on drop
#[derive(Debug)]
pub struct CoverageTaskHandle {
    task: JoinHandle<()>,
}

impl CoverageTaskHandle {
    /// Stop the task
    pub fn stop(self) {
        self.task.abort();
    }

    /// Whether the task has exited
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CoverageTaskHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Composes router, ledger, golden engine and coverage tracker
#[derive(Debug)]
pub struct SafetyGate {
    config: GateConfig,
    router: ConfidenceRouter,
    ledger: Arc<ActionLedger>,
    golden: GoldenEngine,
    coverage: CoverageTracker,
}

impl SafetyGate {
    /// Start building a gate
    #[inline]
    #[must_use]
    pub fn builder() -> SafetyGateBuilder {
        SafetyGateBuilder::new()
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Confidence router
    #[inline]
    #[must_use]
    pub fn router(&self) -> &ConfidenceRouter {
        &self.router
    }

    /// Action ledger
    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &Arc<ActionLedger> {
        &self.ledger
    }

    /// Golden test engine
    #[inline]
    #[must_use]
    pub fn golden(&self) -> &GoldenEngine {
        &self.golden
    }

    /// Kill switch
    #[inline]
    #[must_use]
    pub fn kill_switch(&self) -> &KillSwitch {
        self.golden.kill_switch()
    }

    /// Coverage tracker
    #[inline]
    #[must_use]
    pub fn coverage(&self) -> &CoverageTracker {
        &self.coverage
    }

    /// Evaluate `proposal` against the selected golden tests
    ///
    /// # Errors
    /// See `evaluate_with_tests`
    pub async fn evaluate<P: Serialize + ?Sized>(
        &self,
        proposal: &Proposal,
        payload: &P,
    ) -> Result<GateVerdict, GateError> {
        self.evaluate_with_tests(proposal, payload, None).await
    }

    /// Evaluate `proposal`, optionally against an explicit test set
    ///
    /// # Errors
    /// - `GateError::Validation` for a malformed proposal
    /// - `GateError::KillSwitchUnavailable` when the kill switch state
    ///   cannot be read
    /// - `GateError::Ledger` when the claim cannot be confirmed
    pub async fn evaluate_with_tests<P: Serialize + ?Sized>(
        &self,
        proposal: &Proposal,
        payload: &P,
        tests: Option<Vec<GoldenTest>>,
    ) -> Result<GateVerdict, GateError> {
        proposal.validate()?;
        let mut verdict = GateVerdict {
            proposal_id: proposal.id.clone(),
            disposition: Disposition::Proceed,
            routing: None,
            claim: None,
            report: None,
        };

        let engaged = self
            .golden
            .kill_switch()
            .is_engaged(&proposal.scope)
            .await
            .map_err(|e| {
                tracing::error!("Kill switch state for {} unreadable: {}", proposal.scope, e);
                GateError::KillSwitchUnavailable(e)
            })?;
        if engaged {
            return Ok(Self::conclude(
                verdict,
                Disposition::Blocked(BlockReason::KillSwitchEngaged {
                    scope: proposal.scope.clone(),
                }),
            ));
        }

        let routing = self.router.route(proposal);
        let routed = Disposition::from_routing(routing.decision);
        verdict.routing = Some(routing);

        let claim = self
            .ledger
            .claim(proposal.effective_dedupe_key(), payload)
            .await?;
        let accepted = claim.accepted();
        let record = claim.into_record();
        if !accepted {
            let reason = BlockReason::Duplicate {
                dedupe_key: record.dedupe_key.clone(),
                first_seen: record.first_seen,
            };
            verdict.claim = Some(record);
            return Ok(Self::conclude(verdict, Disposition::Blocked(reason)));
        }
        verdict.claim = Some(record);

        let report = self.golden.run_pre_execution_gate(proposal, tests).await?;
        let disposition = match &report.kill_switch {
            Some(decision) if decision.is_activation() => {
                Disposition::Blocked(BlockReason::KillSwitchActivated {
                    severity: decision.severity,
                })
            }
            _ if !report.all_passed => Disposition::Blocked(BlockReason::GoldenTestsFailed {
                failed: report.final_failures().map(|r| r.test_id.clone()).collect(),
            }),
            _ => routed,
        };
        verdict.report = Some(report);
        Ok(Self::conclude(verdict, disposition))
    }

    fn conclude(mut verdict: GateVerdict, disposition: Disposition) -> GateVerdict {
        match &disposition {
            Disposition::Blocked(reason) => {
                tracing::warn!("Blocked {}: {}", verdict.proposal_id, reason);
            }
            other => tracing::info!("Gate verdict for {}: {:?}", verdict.proposal_id, other),
        }
        verdict.disposition = disposition;
        verdict
    }

    /// Golden tests currently guarding actions, with their flaky state
    pub async fn active_tests(&self) -> Vec<GoldenTest> {
        let tests = match self.golden.cached_tests() {
            Some(tests) => tests,
            None => self.golden.select_tests().selected,
        };
        let mut refreshed = Vec::with_capacity(tests.len());
        for test in tests {
            let state = self.golden.flaky().state(&test.id).await;
            refreshed.push(test.with_flaky_state(&state));
        }
        refreshed
    }

    /// Run one coverage cycle over the catalog and the active tests
    ///
    /// # Errors
    /// `GateError::Coverage` on store failure
    pub async fn coverage_cycle(&self) -> Result<CoverageReport, GateError> {
        let patterns = self.golden.catalog().snapshot();
        let tests = self.active_tests().await;
        Ok(self.coverage.run_cycle(&patterns, &tests).await?)
    }

    /// Start running `coverage_cycle` every `interval`
    ///
    /// The task holds only a weak reference and exits once the gate is
    /// dropped. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn_coverage_task(self: &Arc<Self>, interval: Duration) -> CoverageTaskHandle {
        let gate = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(gate) = gate.upgrade() else {
                    tracing::debug!("Safety gate dropped, stopping coverage task");
                    break;
                };
                if let Err(e) = gate.coverage_cycle().await {
                    tracing::warn!("Coverage cycle failed: {}", e);
                }
            }
        });
        CoverageTaskHandle { task }
    }

    /// Start the hourly purge of expired ledger claims
    #[must_use]
    pub fn spawn_ledger_cleanup(&self) -> CleanupHandle {
        self.ledger.spawn_cleanup()
    }
}

/// Builder for `SafetyGate`
///
/// Defaults: in-memory store, system clock, tracing alerts, default
/// configuration, no registered checks and an empty catalog.
#[derive(Debug, Default)]
pub struct SafetyGateBuilder {
    store: Option<Arc<dyn RecordStore>>,
    clock: Option<Arc<dyn Clock>>,
    alerts: Option<Arc<dyn AlertSink>>,
    config: GateConfig,
    checks: CheckRegistry,
    patterns: Vec<AccidentPattern>,
}

impl SafetyGateBuilder {
    /// Create builder with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set durable store
    #[must_use]
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set clock
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set alert sink
    #[must_use]
    pub fn alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Set configuration
    #[must_use]
    pub fn config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    /// Set check registry
    #[must_use]
    pub fn checks(mut self, checks: CheckRegistry) -> Self {
        self.checks = checks;
        self
    }

    /// Add accident patterns to the catalog
    #[must_use]
    pub fn patterns(mut self, patterns: impl IntoIterator<Item = AccidentPattern>) -> Self {
        self.patterns.extend(patterns);
        self
    }

    /// Build the gate
    ///
    /// # Errors
    /// Invalid configuration or pattern
    pub fn build(self) -> Result<SafetyGate, GateError> {
        self.config.validate()?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let alerts = self.alerts.unwrap_or_else(|| Arc::new(TracingAlertSink));

        let catalog = Arc::new(PatternCatalog::from_patterns(self.patterns)?);
        let router = ConfidenceRouter::new(self.config.router.clone())?;
        let ledger = Arc::new(ActionLedger::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            self.config.ledger,
        )?);
        let golden = GoldenEngine::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&alerts),
            catalog,
            Arc::new(self.checks),
            self.config.golden(),
        )?;
        let coverage = CoverageTracker::new(store, clock, alerts, self.config.coverage)?;

        tracing::info!(
            "Safety gate ready with {} accident patterns",
            golden.catalog().len()
        );
        Ok(SafetyGate {
            config: self.config,
            router,
            ledger,
            golden,
            coverage,
        })
    }
}
