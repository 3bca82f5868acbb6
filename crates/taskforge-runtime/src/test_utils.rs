//! Shared test doubles for the runtime components.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};

use taskforge_core::{FactChange, TaskAssignment, TaskStatus};

use crate::remote::{
    PlanningRecord, ProcessedCallback, ProcessingResult, RemoteError, SolutionProcessor,
    TaskQuery, TaskRecord, TaskSource, UserDirectory, UserRecord,
};
use crate::solver::{AssignmentSolver, BestSolutionEvent, SolverEventListener, SolverFactory};

/// A fixed test epoch plus an offset in seconds.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Polls `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

pub fn record(task_id: i64, status: &str, owner: Option<&str>) -> TaskRecord {
    TaskRecord {
        task_id,
        container_id: "container-1".to_string(),
        process_instance_id: 1_000 + task_id,
        status: status.to_string(),
        priority: 0,
        actual_owner: owner.map(str::to_string),
        last_modified: ts(0),
        planning: None,
    }
}

pub fn planning(user: &str, index: i32, published: bool) -> PlanningRecord {
    PlanningRecord {
        assigned_user: user.to_string(),
        index,
        published,
    }
}

/// Scripted task source: pops one scripted response per query, returning an
/// empty query once the script is drained.
#[derive(Default)]
pub struct FakeTaskSource {
    script: Mutex<VecDeque<Result<TaskQuery, RemoteError>>>,
    pub calls: Mutex<Vec<(Vec<TaskStatus>, Option<DateTime<Utc>>)>>,
}

impl FakeTaskSource {
    pub fn push(&self, result: Result<TaskQuery, RemoteError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn push_tasks(&self, query_time: DateTime<Utc>, tasks: Vec<TaskRecord>) {
        self.push(Ok(TaskQuery { query_time, tasks }));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl TaskSource for FakeTaskSource {
    fn find_tasks(
        &self,
        statuses: &[TaskStatus],
        since: Option<DateTime<Utc>>,
    ) -> Result<TaskQuery, RemoteError> {
        self.calls.lock().unwrap().push((statuses.to_vec(), since));
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(TaskQuery {
                query_time: ts(0),
                tasks: Vec::new(),
            }),
        }
    }
}

/// In-memory user directory.
#[derive(Default)]
pub struct FakeDirectory {
    users: Mutex<Vec<UserRecord>>,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeDirectory {
    pub fn with_users(ids: &[&str]) -> Self {
        let directory = Self::default();
        for id in ids {
            directory.add_user(id, true);
        }
        directory
    }

    pub fn add_user(&self, id: &str, active: bool) {
        self.users.lock().unwrap().push(UserRecord {
            id: id.to_string(),
            active,
        });
    }
}

impl UserDirectory for FakeDirectory {
    fn find_all_users(&self) -> Result<Vec<UserRecord>, RemoteError> {
        Ok(self.users.lock().unwrap().clone())
    }

    fn find_user(&self, id: &str) -> Result<Option<UserRecord>, RemoteError> {
        self.lookups.lock().unwrap().push(id.to_string());
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }
}

#[derive(Debug, Default)]
struct FakeSolverInner {
    solving: bool,
    terminated: bool,
    assignment: Option<TaskAssignment>,
    listeners: Vec<Arc<dyn SolverEventListener>>,
    batches: Vec<Vec<FactChange>>,
}

/// Scripted solver: `solve` blocks on a condvar until terminated, queued
/// fact changes are applied to the working assignment, and tests drive
/// best-solution events explicitly.
#[derive(Debug, Default)]
pub struct FakeSolver {
    inner: Mutex<FakeSolverInner>,
    cv: Condvar,
}

impl FakeSolver {
    pub fn is_solving(&self) -> bool {
        self.inner.lock().unwrap().solving
    }

    pub fn assignment(&self) -> Option<TaskAssignment> {
        self.inner.lock().unwrap().assignment.clone()
    }

    pub fn batches(&self) -> Vec<Vec<FactChange>> {
        self.inner.lock().unwrap().batches.clone()
    }

    /// Fires a best-solution event at every registered listener.
    pub fn emit_best(&self, event: BestSolutionEvent) {
        let listeners = self.inner.lock().unwrap().listeners.clone();
        for listener in listeners {
            listener.on_best_solution_changed(event.clone());
        }
    }

    /// Emits the current working assignment as a fully-processed solution.
    pub fn emit_working_solution(&self) {
        if let Some(solution) = self.assignment() {
            self.emit_best(BestSolutionEvent {
                solution,
                all_changes_processed: true,
                initialized: true,
            });
        }
    }
}

impl AssignmentSolver for FakeSolver {
    fn solve(&self, assignment: TaskAssignment) {
        let mut inner = self.inner.lock().unwrap();
        inner.solving = true;
        inner.assignment = Some(assignment);
        self.cv.notify_all();
        while !inner.terminated {
            inner = self.cv.wait(inner).unwrap();
        }
        inner.solving = false;
        self.cv.notify_all();
    }

    fn add_fact_changes(&self, batch: Vec<FactChange>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(assignment) = inner.assignment.as_mut() {
            let _ = assignment.apply_all(&batch);
        }
        inner.batches.push(batch);
    }

    fn terminate_early(&self) {
        self.inner.lock().unwrap().terminated = true;
        self.cv.notify_all();
    }

    fn add_listener(&self, listener: Arc<dyn SolverEventListener>) {
        self.inner.lock().unwrap().listeners.push(listener);
    }
}

/// Factory recording every solver it creates.
#[derive(Default)]
pub struct FakeSolverFactory {
    created: Mutex<Vec<Arc<FakeSolver>>>,
}

impl FakeSolverFactory {
    pub fn latest(&self) -> Option<Arc<FakeSolver>> {
        self.created.lock().unwrap().last().cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl SolverFactory for FakeSolverFactory {
    fn create_solver(&self) -> Arc<dyn AssignmentSolver> {
        let solver = Arc::new(FakeSolver::default());
        self.created.lock().unwrap().push(Arc::clone(&solver));
        solver
    }
}

/// Listener recording every best-solution event.
#[derive(Debug, Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<BestSolutionEvent>>,
}

impl SolverEventListener for RecordingListener {
    fn on_best_solution_changed(&self, event: BestSolutionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Scripted processor invoking the completion callback synchronously.
#[derive(Default)]
pub struct FakeProcessor {
    results: Mutex<VecDeque<ProcessingResult>>,
    pub processed: Mutex<Vec<TaskAssignment>>,
}

impl FakeProcessor {
    pub fn push_result(&self, result: ProcessingResult) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn processed_count(&self) -> usize {
        self.processed.lock().unwrap().len()
    }
}

impl SolutionProcessor for FakeProcessor {
    fn process(&self, solution: TaskAssignment, on_done: ProcessedCallback) {
        self.processed.lock().unwrap().push(solution);
        let result = self
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ProcessingResult::Success);
        on_done(result);
    }
}
