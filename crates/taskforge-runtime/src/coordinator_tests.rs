//! Tests for the coordinator.

use super::*;
use crate::error::RuntimeError;
use crate::test_utils::{
    record, ts, wait_until, FakeDirectory, FakeProcessor, FakeSolverFactory, FakeTaskSource,
};

const TIMEOUT: Duration = Duration::from_secs(2);

struct Fixture {
    factory: Arc<FakeSolverFactory>,
    source: Arc<FakeTaskSource>,
    processor: Arc<FakeProcessor>,
    coordinator: Arc<Coordinator>,
}

fn fixture() -> Fixture {
    let factory = Arc::new(FakeSolverFactory::default());
    let source = Arc::new(FakeTaskSource::default());
    let directory = Arc::new(FakeDirectory::with_users(&["alice", "bob"]));
    let processor = Arc::new(FakeProcessor::default());
    let config = RuntimeConfig::default().with_sync_interval(Duration::from_millis(10));
    let coordinator = Coordinator::new(
        factory.clone(),
        source.clone(),
        directory,
        processor.clone(),
        &config,
    )
    .unwrap();
    Fixture {
        factory,
        source,
        processor,
        coordinator,
    }
}

fn teardown(fixture: &Fixture) {
    assert!(fixture.coordinator.shutdown(TIMEOUT));
}

fn accepted_event(solution: TaskAssignment) -> BestSolutionEvent {
    BestSolutionEvent {
        solution,
        all_changes_processed: true,
        initialized: true,
    }
}

#[test]
fn tracker_reacts_exactly_once_per_id() {
    let mut tracker = ChangeSetTracker::new();
    assert_eq!(tracker.next(), 1);
    assert_eq!(tracker.next(), 2);

    assert!(!tracker.is_processed(2));
    tracker.mark_processed(2);
    assert!(tracker.is_processed(2));
    assert!(tracker.is_processed(1));
    assert!(!tracker.is_processed(3));

    tracker.clear_processed();
    assert!(!tracker.is_processed(2));
}

#[test]
fn invalid_config_is_rejected() {
    let factory = Arc::new(FakeSolverFactory::default());
    let source = Arc::new(FakeTaskSource::default());
    let directory = Arc::new(FakeDirectory::default());
    let processor = Arc::new(FakeProcessor::default());
    let config = RuntimeConfig::default().with_publish_window_size(0);

    assert!(matches!(
        Coordinator::new(factory, source, directory, processor, &config),
        Err(RuntimeError::Config(_))
    ));
}

#[test]
fn best_solution_is_processed_once_per_change_set() {
    let fixture = fixture();

    let event = accepted_event(TaskAssignment::new());
    fixture.coordinator.on_best_solution(event.clone());
    fixture.coordinator.on_best_solution(event.clone());
    fixture.coordinator.on_best_solution(event);
    assert_eq!(fixture.processor.processed_count(), 1);

    let mut next = TaskAssignment::new();
    next.apply(&FactChange::ChangeSet(1)).unwrap();
    fixture.coordinator.on_best_solution(accepted_event(next));
    assert_eq!(fixture.processor.processed_count(), 2);

    teardown(&fixture);
}

#[test]
fn unsettled_solutions_are_skipped() {
    let fixture = fixture();

    fixture.coordinator.on_best_solution(BestSolutionEvent {
        solution: TaskAssignment::new(),
        all_changes_processed: false,
        initialized: true,
    });
    fixture.coordinator.on_best_solution(BestSolutionEvent {
        solution: TaskAssignment::new(),
        all_changes_processed: true,
        initialized: false,
    });
    assert_eq!(fixture.processor.processed_count(), 0);
    assert!(fixture.coordinator.current_solution().is_none());

    teardown(&fixture);
}

#[test]
fn full_cycle_recover_publish_synchronize() {
    let fixture = fixture();
    fixture.source.push_tasks(
        ts(10),
        vec![record(1, "Ready", None), record(2, "Reserved", Some("alice"))],
    );

    fixture.coordinator.start();
    assert!(wait_until(TIMEOUT, || fixture.coordinator.runner().is_started()));
    let solver = fixture.factory.latest().unwrap();
    assert!(wait_until(TIMEOUT, || solver.is_solving()));

    // First best solution (change set 0) goes straight to the processor.
    solver.emit_working_solution();
    assert_eq!(fixture.processor.processed_count(), 1);
    assert!(fixture.coordinator.current_solution().is_some());

    // Success resumes synchronization; the first poll re-asserts the
    // sentinel pair and rides on change set 1.
    assert!(wait_until(TIMEOUT, || !solver.batches().is_empty()));
    let batch = solver.batches()[0].clone();
    assert_eq!(batch[0], FactChange::ChangeSet(1));

    // The solver reflects the batch; its next best solution is accepted.
    solver.emit_working_solution();
    assert!(wait_until(TIMEOUT, || fixture.processor.processed_count() == 2));

    // A new external record arrives and is forwarded as an Add.
    fixture
        .source
        .push_tasks(ts(20), vec![record(7, "Ready", None)]);
    assert!(wait_until(TIMEOUT, || solver.batches().len() >= 2));
    let batch = solver.batches()[1].clone();
    assert_eq!(batch[0], FactChange::ChangeSet(2));
    assert!(matches!(batch[1], FactChange::Add { .. }));

    teardown(&fixture);
}

#[test]
fn fatal_processing_voids_the_solution_and_recovers() {
    let fixture = fixture();
    fixture
        .source
        .push_tasks(ts(10), vec![record(1, "Ready", None)]);
    fixture.coordinator.start();
    assert!(wait_until(TIMEOUT, || fixture.coordinator.runner().is_started()));
    let first_solver = fixture.factory.latest().unwrap();
    assert!(wait_until(TIMEOUT, || first_solver.is_solving()));

    fixture
        .processor
        .push_result(ProcessingResult::Fatal("write rejected".to_string()));
    first_solver.emit_working_solution();
    assert_eq!(fixture.processor.processed_count(), 1);

    // The runner is stopped and the in-memory solution discarded.
    assert!(wait_until(TIMEOUT, || fixture.coordinator.runner().is_stopped()));
    assert!(fixture.coordinator.current_solution().is_none());

    // The sync loop is back in Init mode: the next non-empty snapshot
    // starts a fresh solver.
    fixture
        .source
        .push_tasks(ts(30), vec![record(2, "Ready", None)]);
    assert!(wait_until(TIMEOUT, || fixture.coordinator.runner().is_started()));
    assert_eq!(fixture.factory.created_count(), 2);

    // The processed marker was cleared, so change set 0 is accepted again.
    let second_solver = fixture.factory.latest().unwrap();
    assert!(wait_until(TIMEOUT, || second_solver.is_solving()));
    second_solver.emit_working_solution();
    assert_eq!(fixture.processor.processed_count(), 2);

    teardown(&fixture);
}

#[test]
fn recoverable_processing_just_resumes_synchronization() {
    let fixture = fixture();
    fixture
        .source
        .push_tasks(ts(10), vec![record(1, "Ready", None)]);
    fixture.coordinator.start();
    assert!(wait_until(TIMEOUT, || fixture.coordinator.runner().is_started()));
    let solver = fixture.factory.latest().unwrap();
    assert!(wait_until(TIMEOUT, || solver.is_solving()));

    fixture
        .processor
        .push_result(ProcessingResult::Recoverable("task changed".to_string()));
    solver.emit_working_solution();
    assert_eq!(fixture.processor.processed_count(), 1);

    // No restart: same solver, and polling resumed.
    assert!(fixture.coordinator.runner().is_started());
    assert_eq!(fixture.factory.created_count(), 1);
    assert!(wait_until(TIMEOUT, || !solver.batches().is_empty()));

    teardown(&fixture);
}

#[test]
fn irrelevant_or_empty_sync_results_are_dropped() {
    let fixture = fixture();

    // Solver not started: the batch is no longer relevant.
    fixture
        .coordinator
        .on_sync_changes(vec![FactChange::ChangeSet(1)], ts(5));
    // Empty batches are dropped silently.
    fixture.coordinator.on_sync_changes(Vec::new(), ts(6));
    assert_eq!(fixture.factory.created_count(), 0);

    teardown(&fixture);
}
