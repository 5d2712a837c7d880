//! End-to-end gate scenarios over a shared store.

use aegis_boundary::{BroadcastAlertSink, AlertKind, MemoryStore, RecordStore};
use aegis_golden::{
    AccidentPattern, CheckFailure, CheckRegistry, FlakyStatus, GoldenConfig, GoldenEngine,
    GoldenTest, KillSwitchAction, PatternCatalog,
};
use aegis_types::{BlastRadius, Impact, ManualClock, Proposal, Severity, TaskType};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn failing_checks(ids: &[&str]) -> CheckRegistry {
    let mut checks = CheckRegistry::new();
    for id in ids {
        checks.register_fn(*id, |_| Err(CheckFailure::new("regression reproduced")));
    }
    checks
}

fn engine(store: Arc<dyn RecordStore>, clock: Arc<ManualClock>, checks: CheckRegistry) -> GoldenEngine {
    GoldenEngine::new(
        store,
        clock,
        Arc::new(BroadcastAlertSink::default()),
        Arc::new(PatternCatalog::new()),
        Arc::new(checks),
        GoldenConfig::default(),
    )
    .unwrap()
}

fn test_for(id: &str, severity: Severity) -> GoldenTest {
    let pattern = AccidentPattern::new(id, id, severity, BlastRadius::Project);
    GoldenTest::from_pattern(&pattern, 0.9, 2_000)
}

fn proposal(scope: &str) -> Proposal {
    Proposal::new("deploy-1", 0.95, Impact::Critical, TaskType::Maintenance, scope)
}

#[tokio::test(start_paused = true)]
async fn two_high_failures_within_window_activate() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let engine = engine(Arc::clone(&store), Arc::clone(&clock), failing_checks(&["h1"]));
    let tests = vec![test_for("h1", Severity::High)];

    let first = engine
        .run_pre_execution_gate(&proposal("billing"), Some(tests.clone()))
        .await
        .unwrap();
    assert_eq!(first.kill_switch.as_ref().unwrap().action, KillSwitchAction::Delay);
    assert!(!engine.kill_switch().is_engaged("billing").await.unwrap());

    clock.advance(chrono::Duration::minutes(3));
    let second = engine
        .run_pre_execution_gate(&proposal("billing"), Some(tests))
        .await
        .unwrap();
    let decision = second.kill_switch.unwrap();
    assert_eq!(decision.action, KillSwitchAction::Activate);
    assert_eq!(decision.failure_count, 2);
    assert!(engine.kill_switch().is_engaged("billing").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn single_critical_failure_activates_and_alerts() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let alerts = Arc::new(BroadcastAlertSink::new(16));
    let mut rx = alerts.subscribe();
    let engine = GoldenEngine::new(
        store,
        clock,
        alerts,
        Arc::new(PatternCatalog::new()),
        Arc::new(failing_checks(&["c1"])),
        GoldenConfig::default(),
    )
    .unwrap();

    let report = engine
        .run_pre_execution_gate(
            &proposal("infra"),
            Some(vec![test_for("c1", Severity::Critical), test_for("ok", Severity::Low)]),
        )
        .await
        .unwrap();

    assert!(!report.all_passed);
    assert!(report.kill_switch_activated());
    assert_eq!(report.final_failures().count(), 1);
    assert_eq!(rx.recv().await.unwrap().kind, AlertKind::KillSwitchActivated);
}

#[tokio::test(start_paused = true)]
async fn state_survives_engine_restart() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let tests = vec![test_for("c1", Severity::Critical)];

    {
        let engine = engine(Arc::clone(&store), Arc::clone(&clock), failing_checks(&["c1"]));
        for _ in 0..2 {
            engine
                .run_pre_execution_gate(&proposal("infra"), Some(tests.clone()))
                .await
                .unwrap();
        }
    }

    let restarted = engine(store, clock, failing_checks(&["c1"]));
    assert!(restarted.kill_switch().is_engaged("infra").await.unwrap());
    assert_eq!(restarted.flaky().state("golden-c1").await.status, FlakyStatus::Suspect);

    restarted.kill_switch().clear("infra", "sre-oncall").await.unwrap();
    assert!(!restarted.kill_switch().is_engaged("infra").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn quarantined_test_restored_by_revalidation() {
    let broken = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&broken);
    let mut checks = CheckRegistry::new();
    checks.register_fn("flappy", move |_| {
        if flag.load(Ordering::SeqCst) {
            Err(CheckFailure::new("flapping"))
        } else {
            Ok(())
        }
    });

    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let engine = engine(store, Arc::new(ManualClock::starting_now()), checks);
    let tests = vec![test_for("flappy", Severity::Low)];
    let target = proposal("staging");

    for _ in 0..3 {
        engine
            .run_pre_execution_gate(&target, Some(tests.clone()))
            .await
            .unwrap();
    }
    assert_eq!(engine.flaky().state("golden-flappy").await.status, FlakyStatus::Quarantined);

    broken.store(false, Ordering::SeqCst);
    for round in 1..=20 {
        let outcomes = engine.revalidate(&tests, &target).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].consecutive_passes, round);
        assert_eq!(outcomes[0].restored, round == 20);
    }

    // Restored tests gate again, and no longer need re-validation
    assert!(engine.revalidate(&tests, &target).await.unwrap().is_empty());
    let report = engine.run_pre_execution_gate(&target, Some(tests)).await.unwrap();
    assert!(report.skipped_quarantined.is_empty());
    assert!(report.all_passed);
}

#[tokio::test(start_paused = true)]
async fn independent_failures_do_not_abort_other_tests() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let engine = engine(store, Arc::new(ManualClock::starting_now()), failing_checks(&["m1"]));

    let report = engine
        .run_pre_execution_gate(
            &proposal("repo"),
            Some(vec![
                test_for("m1", Severity::Medium),
                test_for("a", Severity::Low),
                test_for("b", Severity::High),
            ]),
        )
        .await
        .unwrap();

    let summary: Vec<_> = report
        .summaries
        .iter()
        .map(|s| (s.test_id.as_str(), s.attempts))
        .collect();
    assert_eq!(summary, vec![("golden-m1", 3), ("golden-a", 1), ("golden-b", 1)]);
    assert_eq!(report.kill_switch.unwrap().action, KillSwitchAction::Delay);
}

#[tokio::test(start_paused = true)]
async fn quarantine_recorded_elsewhere_is_honored() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let first = engine(Arc::clone(&store), Arc::clone(&clock), failing_checks(&["p1"]));
    let second = engine(Arc::clone(&store), Arc::clone(&clock), failing_checks(&["p1"]));
    let tests = vec![test_for("p1", Severity::Low)];

    second
        .run_pre_execution_gate(&proposal("repo"), Some(tests.clone()))
        .await
        .unwrap();
    first
        .run_pre_execution_gate(&proposal("repo"), Some(tests.clone()))
        .await
        .unwrap();
    let quarantining = first
        .run_pre_execution_gate(&proposal("repo"), Some(tests.clone()))
        .await
        .unwrap();
    assert_eq!(quarantining.newly_quarantined, vec!["golden-p1".to_string()]);

    let report = second
        .run_pre_execution_gate(&proposal("repo"), Some(tests))
        .await
        .unwrap();
    assert_eq!(report.skipped_quarantined, vec!["golden-p1".to_string()]);
    assert!(report.summaries.is_empty());

    let state = second.flaky().state("golden-p1").await;
    assert_eq!(state.status, FlakyStatus::Quarantined);
    assert_eq!(state.failure_count, 3);
}

#[tokio::test(start_paused = true)]
async fn failed_revalidation_does_not_count_towards_kill_switch() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let engine = engine(
        store,
        Arc::new(ManualClock::starting_now()),
        failing_checks(&["p1", "p2"]),
    );
    let quarantined = test_for("p1", Severity::High);
    for _ in 0..3 {
        engine.flaky().record_outcome(&quarantined, false).await;
    }

    let outcomes = engine
        .revalidate(&[quarantined], &proposal("billing"))
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].restored);

    let report = engine
        .run_pre_execution_gate(&proposal("billing"), Some(vec![test_for("p2", Severity::High)]))
        .await
        .unwrap();
    let decision = report.kill_switch.unwrap();
    assert_eq!(decision.action, KillSwitchAction::Delay);
    assert_eq!(decision.failure_count, 1);
    assert!(!engine.kill_switch().is_engaged("billing").await.unwrap());
}
