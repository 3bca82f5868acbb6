//! Background synchronization with the external task source.
//!
//! The loop runs on its own thread in one of two caller-selected modes:
//! Init (full recovery and solver start) or Synchronize (incremental
//! polling). A mode request is consumed once it makes forward progress;
//! until then the loop retries every poll interval. Errors never terminate
//! the loop: they are logged and retried after the interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, error, info, warn};

use taskforge_core::{FactChange, TaskAssignment, TaskStatus};

use crate::diff::ChangeBuilder;
use crate::error::Result;
use crate::recovery::SolutionBuilder;
use crate::remote::{TaskSource, UserDirectory};
use crate::runner::SolverRunner;

/// Receiver of synchronization results.
pub trait SyncEventHandler: Send + Sync {
    /// A poll produced a non-empty fact-change batch. `query_time` is the
    /// timestamp usable as the next high-water-mark once the batch has been
    /// processed.
    fn on_changes(&self, batch: Vec<FactChange>, query_time: DateTime<Utc>);

    /// Supplies the change-set id stamped into the next non-empty batch.
    fn next_change_set(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Init,
    Synchronize,
}

enum Cycle {
    /// The current mode request was consumed.
    Done,
    /// No forward progress; sleep one interval and try again.
    Retry,
}

#[derive(Default)]
struct LoopState {
    mode: Option<Mode>,
    /// Bumped on every request so a finished cycle does not clear a newer one.
    seq: u64,
    solution: Option<TaskAssignment>,
    /// High-water-mark; advances only when a poll found no changes.
    since: Option<DateTime<Utc>>,
}

struct Directive {
    mode: Mode,
    seq: u64,
    solution: Option<TaskAssignment>,
    since: Option<DateTime<Utc>>,
}

struct SyncShared {
    task_source: Arc<dyn TaskSource>,
    directory: Arc<dyn UserDirectory>,
    runner: Arc<SolverRunner>,
    handler: Arc<dyn SyncEventHandler>,
    interval: Duration,
    destroyed: AtomicBool,
    state: Mutex<LoopState>,
    signal: Condvar,
}

/// The background synchronization loop.
pub struct SyncLoop {
    shared: Arc<SyncShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SyncLoop {
    /// Creates the loop and spawns its thread; it idles until a mode is
    /// requested.
    pub fn new(
        task_source: Arc<dyn TaskSource>,
        directory: Arc<dyn UserDirectory>,
        runner: Arc<SolverRunner>,
        handler: Arc<dyn SyncEventHandler>,
        interval: Duration,
    ) -> Result<Self> {
        let shared = Arc::new(SyncShared {
            task_source,
            directory,
            runner,
            handler,
            interval,
            destroyed: AtomicBool::new(false),
            state: Mutex::new(LoopState::default()),
            signal: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("taskforge-sync".to_string())
            .spawn(move || run(thread_shared))?;
        Ok(Self {
            shared,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Requests Init mode: full recovery and solver (re)start.
    pub fn init_solver_execution(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.mode = Some(Mode::Init);
        state.seq += 1;
        state.solution = None;
        self.shared.signal.notify_all();
    }

    /// Requests Synchronize mode against `solution`. When `since` is given
    /// it replaces the loop's high-water-mark.
    pub fn synchronize(&self, solution: TaskAssignment, since: Option<DateTime<Utc>>) {
        let mut state = self.shared.state.lock().unwrap();
        state.mode = Some(Mode::Synchronize);
        state.seq += 1;
        state.solution = Some(solution);
        if since.is_some() {
            state.since = since;
        }
        self.shared.signal.notify_all();
    }

    /// Idempotent shutdown signal.
    pub fn destroy(&self) {
        if !self.shared.destroyed.swap(true, Ordering::SeqCst) {
            info!(event = "sync_loop_destroyed");
        }
        // Notify under the lock so a waiter between its destroyed check and
        // its wait cannot miss the wakeup.
        let _state = self.shared.state.lock().unwrap();
        self.shared.signal.notify_all();
    }

    /// Waits up to `grace` for the thread to exit after
    /// [`destroy`](Self::destroy).
    pub fn join(&self, grace: Duration) -> bool {
        let handle = self.thread.lock().unwrap().take();
        let Some(handle) = handle else {
            return true;
        };
        let deadline = Instant::now() + grace;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            let _ = handle.join();
            true
        } else {
            *self.thread.lock().unwrap() = Some(handle);
            false
        }
    }
}

fn run(shared: Arc<SyncShared>) {
    loop {
        let directive = {
            let mut state = shared.state.lock().unwrap();
            loop {
                if shared.destroyed.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(mode) = state.mode {
                    break Directive {
                        mode,
                        seq: state.seq,
                        solution: state.solution.clone(),
                        since: state.since,
                    };
                }
                state = shared.signal.wait(state).unwrap();
            }
        };

        let outcome = match directive.mode {
            Mode::Init => shared.init_cycle(),
            Mode::Synchronize => {
                shared.synchronize_cycle(directive.solution.as_ref(), directive.since)
            }
        };

        match outcome {
            Cycle::Done => {
                let mut state = shared.state.lock().unwrap();
                if state.seq == directive.seq {
                    state.mode = None;
                }
            }
            Cycle::Retry => {
                let state = shared.state.lock().unwrap();
                if shared.destroyed.load(Ordering::SeqCst) {
                    return;
                }
                let _unused = shared.signal.wait_timeout(state, shared.interval).unwrap();
            }
        }
    }
}

impl SyncShared {
    /// Full recovery: fetch all non-terminal tasks plus the roster, build a
    /// fresh assignment and start the solver when there is real work.
    fn init_cycle(&self) -> Cycle {
        if !self.runner.is_stopped() {
            return Cycle::Retry;
        }
        let roster = match self.directory.find_all_users() {
            Ok(roster) => roster,
            Err(err) => {
                warn!(event = "roster_fetch_failed", error = %err);
                return Cycle::Retry;
            }
        };
        let query = match self.task_source.find_tasks(TaskStatus::NON_TERMINAL, None) {
            Ok(query) => query,
            Err(err) => {
                warn!(event = "recovery_fetch_failed", error = %err);
                return Cycle::Retry;
            }
        };
        let query_time = query.query_time;
        let assignment = match SolutionBuilder::new().tasks(query.tasks).users(roster).build() {
            Ok(assignment) => assignment,
            Err(err) => {
                error!(event = "recovery_failed", error = %err);
                return Cycle::Retry;
            }
        };
        if assignment.non_sentinel_task_count() == 0 {
            debug!(event = "recovery_empty");
            return Cycle::Retry;
        }
        match self.runner.start(assignment) {
            Ok(()) => {
                self.state.lock().unwrap().since = Some(query_time);
                info!(event = "solver_execution_initialized");
                Cycle::Done
            }
            Err(err) => {
                warn!(event = "solver_start_failed", error = %err);
                Cycle::Retry
            }
        }
    }

    /// Incremental poll: fetch records modified since the high-water-mark,
    /// diff them against the current solution and report a non-empty batch.
    fn synchronize_cycle(
        &self,
        solution: Option<&TaskAssignment>,
        since: Option<DateTime<Utc>>,
    ) -> Cycle {
        if !self.runner.is_started() {
            return Cycle::Retry;
        }
        let Some(solution) = solution else {
            warn!(event = "sync_without_solution");
            return Cycle::Done;
        };
        let Some(since) = since else {
            warn!(event = "sync_without_high_water_mark");
            return Cycle::Done;
        };

        // The external store keeps whole-second modification times; querying
        // with sub-second precision would skip records.
        let since = truncate_to_seconds(since);
        let query = match self.task_source.find_tasks(&[], Some(since)) {
            Ok(query) => query,
            Err(err) => {
                warn!(event = "sync_fetch_failed", error = %err);
                return Cycle::Retry;
            }
        };

        let builder = ChangeBuilder::new(solution, self.directory.as_ref());
        let batch = match builder.build(&query.tasks, || self.handler.next_change_set()) {
            Ok(batch) => batch,
            Err(err) => {
                error!(event = "diff_failed", error = %err);
                return Cycle::Retry;
            }
        };

        if batch.is_empty() {
            self.state.lock().unwrap().since = Some(query.query_time);
            debug!(event = "sync_idle");
            Cycle::Retry
        } else {
            info!(event = "sync_changes", size = batch.len());
            self.handler.on_changes(batch, query.query_time);
            Cycle::Done
        }
    }
}

fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
