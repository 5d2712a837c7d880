//! Testing utilities for the Aegis workspace
//!
//! Shared fixtures, scripted checks and misbehaving collaborators.

#![allow(missing_docs)]

use aegis_boundary::{
    Alert, AlertSink, InsertOutcome, MemoryStore, Record, RecordId, RecordQuery, RecordStore, Scope,
    StoreError,
};
use aegis_golden::{AccidentPattern, CheckContext, CheckFailure, GoldenCheck, GoldenTest};
use aegis_types::{BlastRadius, Impact, Proposal, Severity, TaskType};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub use aegis_types::ManualClock;

pub fn create_pattern(id: &str, severity: Severity, blast_radius: BlastRadius) -> AccidentPattern {
    AccidentPattern::new(id, format!("{id} accident"), severity, blast_radius)
        .with_root_cause(format!("{id} root cause"))
        .with_description(format!("{id} broke something"))
}

/// One pattern per severity, critical first: `p-critical`, `p-high`,
/// `p-medium`, `p-low`
pub fn create_pattern_per_severity() -> Vec<AccidentPattern> {
    [Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
        .into_iter()
        .map(|severity| create_pattern(&format!("p-{severity}"), severity, BlastRadius::Project))
        .collect()
}

pub fn create_test(pattern: &AccidentPattern) -> GoldenTest {
    GoldenTest::from_pattern(pattern, 0.9, 1_000)
}

/// Test of `severity` covering `pattern_id`
pub fn create_test_covering(pattern_id: &str, severity: Severity) -> GoldenTest {
    create_test(&create_pattern(pattern_id, severity, BlastRadius::Project))
}

pub fn create_proposal(confidence: f64, impact: Impact, task_type: TaskType) -> Proposal {
    Proposal::new("proposal-1", confidence, impact, task_type, "workspace")
}

/// Confident, low-impact maintenance proposal that auto-approves
pub fn create_safe_proposal(id: &str) -> Proposal {
    Proposal::new(id, 0.95, Impact::Low, TaskType::Maintenance, "workspace")
        .with_description(format!("routine upkeep {id}"))
}

pub fn shared_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Check that plays back a script of outcomes, repeating the last one
#[derive(Debug)]
pub struct ScriptedCheck {
    script: Mutex<VecDeque<bool>>,
    last: Mutex<bool>,
    calls: Mutex<u32>,
}

impl ScriptedCheck {
    pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            last: Mutex::new(true),
            calls: Mutex::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self::new([false])
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait::async_trait]
impl GoldenCheck for ScriptedCheck {
    async fn run(&self, _ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        *self.calls.lock() += 1;
        let passed = {
            let mut last = self.last.lock();
            if let Some(next) = self.script.lock().pop_front() {
                *last = next;
            }
            *last
        };
        if passed {
            Ok(())
        } else {
            Err(CheckFailure::new("scripted failure"))
        }
    }
}

/// Check that sleeps before passing
#[derive(Debug, Clone, Copy)]
pub struct SlowCheck(pub Duration);

#[async_trait::async_trait]
impl GoldenCheck for SlowCheck {
    async fn run(&self, _ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// Store that fails every call for the chosen scopes and delegates the rest
#[derive(Debug)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: HashSet<Scope>,
}

impl FailingStore {
    /// Fails every scope
    pub fn new() -> Self {
        Self::failing([
            Scope::ActionLedger,
            Scope::ExecutionResults,
            Scope::FlakyState,
            Scope::KillSwitch,
            Scope::Coverage,
        ])
    }

    pub fn failing(scopes: impl IntoIterator<Item = Scope>) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: scopes.into_iter().collect(),
        }
    }

    fn check(&self, scope: Scope) -> Result<(), StoreError> {
        if self.failing.contains(&scope) {
            Err(StoreError::Unavailable(format!("{} offline", scope.as_str())))
        } else {
            Ok(())
        }
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RecordStore for FailingStore {
    async fn append(&self, record: Record) -> Result<RecordId, StoreError> {
        self.check(record.scope)?;
        self.inner.append(record).await
    }

    async fn insert_if_absent(&self, record: Record) -> Result<InsertOutcome, StoreError> {
        self.check(record.scope)?;
        self.inner.insert_if_absent(record).await
    }

    async fn query(&self, scope: Scope, query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        self.check(scope)?;
        self.inner.query(scope, query).await
    }

    async fn purge_expired(&self, scope: Scope, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.check(scope)?;
        self.inner.purge_expired(scope, now).await
    }
}

/// Sink that keeps every alert for inspection
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }
}

#[async_trait::async_trait]
impl AlertSink for RecordingAlertSink {
    async fn emit(&self, alert: Alert) {
        self.alerts.lock().push(alert);
    }
}
