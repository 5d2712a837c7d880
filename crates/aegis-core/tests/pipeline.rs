//! Safety gate scenarios across router, ledger, golden engine and coverage.

use aegis_boundary::{AlertKind, FileStore, RecordStore, Scope};
use aegis_core::{BlockReason, Disposition, GateConfig, GateError, SafetyGate};
use aegis_golden::{CheckRegistry, FlakyStatus};
use aegis_test_utils::{
    create_pattern, create_pattern_per_severity, create_safe_proposal, create_test_covering,
    shared_store, FailingStore, ManualClock, RecordingAlertSink, ScriptedCheck,
};
use aegis_types::{BlastRadius, Impact, Proposal, Severity};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn in_scope(id: &str, scope: &str, impact: Impact) -> Proposal {
    Proposal {
        scope: scope.to_string(),
        impact,
        ..create_safe_proposal(id)
    }
}

#[tokio::test]
async fn repeated_proposal_is_blocked_as_duplicate() {
    let gate = SafetyGate::builder()
        .clock(Arc::new(ManualClock::starting_now()))
        .build()
        .unwrap();
    let proposal = create_safe_proposal("rotate-logs");

    let first = gate.evaluate(&proposal, "rotate /var/log").await.unwrap();
    assert_eq!(first.disposition, Disposition::Proceed);

    let second = gate.evaluate(&proposal, "rotate /var/log").await.unwrap();
    let Disposition::Blocked(BlockReason::Duplicate { dedupe_key, first_seen }) =
        second.disposition
    else {
        panic!("expected duplicate, got {:?}", second.disposition);
    };
    assert_eq!(dedupe_key, "rotate-logs");
    assert_eq!(first_seen, first.claim.unwrap().first_seen);
    assert!(second.routing.is_some());
    assert!(second.report.is_none());
}

#[tokio::test(start_paused = true)]
async fn critical_regression_halts_scope_until_cleared() {
    let clock = Arc::new(ManualClock::starting_now());
    let alerts = Arc::new(RecordingAlertSink::new());
    let mut checks = CheckRegistry::new();
    checks.register("p-critical", Arc::new(ScriptedCheck::always_failing()));
    let gate = SafetyGate::builder()
        .clock(clock.clone())
        .alerts(alerts.clone())
        .checks(checks)
        .patterns([create_pattern("p-critical", Severity::Critical, BlastRadius::System)])
        .build()
        .unwrap();

    let risky = in_scope("drop-table", "billing", Impact::Critical);
    let verdict = gate.evaluate(&risky, &risky).await.unwrap();
    assert_eq!(
        verdict.disposition,
        Disposition::Blocked(BlockReason::KillSwitchActivated {
            severity: Severity::Critical
        })
    );
    let report = verdict.report.unwrap();
    assert_eq!(report.summaries.len(), 1);
    assert_eq!(report.summaries[0].attempts, 3);
    assert!(alerts
        .alerts()
        .iter()
        .any(|a| a.kind == AlertKind::KillSwitchActivated && a.scope == "billing"));

    // Every later action in the scope is refused before routing
    let harmless = in_scope("vacuum", "billing", Impact::Low);
    let refused = gate.evaluate(&harmless, "vacuum").await.unwrap();
    assert_eq!(
        refused.disposition,
        Disposition::Blocked(BlockReason::KillSwitchEngaged {
            scope: "billing".into()
        })
    );
    assert!(refused.routing.is_none());
    assert!(refused.claim.is_none());

    // Other scopes are unaffected
    let elsewhere = in_scope("vacuum-search", "search", Impact::Low);
    assert_eq!(
        gate.evaluate(&elsewhere, "vacuum").await.unwrap().disposition,
        Disposition::Proceed
    );

    clock.advance(chrono::Duration::minutes(10));
    gate.kill_switch().clear("billing", "oncall").await.unwrap();
    let resumed = gate.evaluate(&harmless, "vacuum").await.unwrap();
    assert_eq!(resumed.disposition, Disposition::Proceed);
}

#[tokio::test(start_paused = true)]
async fn failing_test_blocks_without_tripping() {
    let mut checks = CheckRegistry::new();
    checks.register("p-low", Arc::new(ScriptedCheck::always_failing()));
    let gate = SafetyGate::builder()
        .clock(Arc::new(ManualClock::starting_now()))
        .checks(checks)
        .build()
        .unwrap();
    let proposal = create_safe_proposal("tidy");
    let tests = vec![create_test_covering("p-low", Severity::Low)];

    let verdict = gate
        .evaluate_with_tests(&proposal, "tidy", Some(tests))
        .await
        .unwrap();
    assert_eq!(
        verdict.disposition,
        Disposition::Blocked(BlockReason::GoldenTestsFailed {
            failed: vec!["golden-p-low".into()]
        })
    );
    let report = verdict.report.unwrap();
    assert!(!report.kill_switch_activated());
    assert_eq!(report.summaries[0].flaky_status, FlakyStatus::Stable);
    assert!(!gate.kill_switch().is_engaged("workspace").await.unwrap());
}

#[tokio::test]
async fn ledger_outage_fails_closed() {
    let gate = SafetyGate::builder()
        .store(Arc::new(FailingStore::failing([Scope::ActionLedger])))
        .build()
        .unwrap();

    let err = gate
        .evaluate(&create_safe_proposal("restart-worker"), "restart")
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Ledger(_)));
    assert!(err.is_persistence());
}

#[tokio::test]
async fn unreadable_kill_switch_fails_closed() {
    let gate = SafetyGate::builder()
        .store(Arc::new(FailingStore::failing([Scope::KillSwitch])))
        .build()
        .unwrap();

    let err = gate
        .evaluate(&create_safe_proposal("restart-worker"), "restart")
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::KillSwitchUnavailable(_)));
}

#[tokio::test]
async fn claims_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aegis.jsonl");
    let clock = Arc::new(ManualClock::starting_now());
    let proposal = create_safe_proposal("nightly-backup");

    {
        let store: Arc<dyn RecordStore> = Arc::new(FileStore::open(path.clone()).await.unwrap());
        let gate = SafetyGate::builder()
            .store(store)
            .clock(clock.clone())
            .build()
            .unwrap();
        let verdict = gate.evaluate(&proposal, "backup").await.unwrap();
        assert_eq!(verdict.disposition, Disposition::Proceed);
    }

    let store: Arc<dyn RecordStore> = Arc::new(FileStore::open(path).await.unwrap());
    let gate = SafetyGate::builder()
        .store(store)
        .clock(clock.clone())
        .build()
        .unwrap();
    let verdict = gate.evaluate(&proposal, "backup").await.unwrap();
    assert!(matches!(
        verdict.disposition,
        Disposition::Blocked(BlockReason::Duplicate { .. })
    ));

    clock.advance(chrono::Duration::hours(25));
    let verdict = gate.evaluate(&proposal, "backup").await.unwrap();
    assert_eq!(verdict.disposition, Disposition::Proceed);
}

#[tokio::test]
async fn coverage_cycle_reports_catalog() {
    let gate = SafetyGate::builder()
        .store(shared_store())
        .clock(Arc::new(ManualClock::starting_now()))
        .alerts(Arc::new(RecordingAlertSink::new()))
        .patterns(create_pattern_per_severity())
        .build()
        .unwrap();

    let report = gate.coverage_cycle().await.unwrap();
    assert_eq!(report.metrics.total_patterns, 4);
    let critical = report.metrics.severity(Severity::Critical);
    assert_eq!((critical.covered, critical.total), (1, 1));
    assert_eq!(gate.coverage().snapshots(10).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn coverage_task_runs_periodically() {
    let gate = Arc::new(
        SafetyGate::builder()
            .clock(Arc::new(ManualClock::starting_now()))
            .alerts(Arc::new(RecordingAlertSink::new()))
            .patterns(create_pattern_per_severity())
            .build()
            .unwrap(),
    );

    let handle = gate.spawn_coverage_task(Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(150)).await;
    assert!(gate.coverage().snapshots(10).await.unwrap().len() >= 2);
    assert!(!handle.is_finished());
    handle.stop();
}

#[test]
fn builder_rejects_invalid_config() {
    let mut config = GateConfig::default();
    config.router.default_threshold = 1.5;
    let err = SafetyGate::builder().config(config).build().unwrap_err();
    assert!(matches!(err, GateError::Validation(_)));
}
