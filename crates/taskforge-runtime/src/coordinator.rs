//! Orchestration: correlating solver events, publication and recovery.
//!
//! The coordinator owns the only cross-thread mutable state of the runtime
//! (current best solution, change-set bookkeeping, last external query
//! time) behind a single mutex held only for short, I/O-free sections. A
//! best-solution event is acted on at most once per change-set id; a fatal
//! processing error voids the in-memory solution and forces a full
//! recovery.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use taskforge_config::RuntimeConfig;
use taskforge_core::{FactChange, TaskAssignment};

use crate::error::Result;
use crate::remote::{ProcessingResult, SolutionProcessor, TaskSource, UserDirectory};
use crate::runner::SolverRunner;
use crate::solver::{BestSolutionEvent, SolverEventListener, SolverFactory};
use crate::sync::{SyncEventHandler, SyncLoop};

/// Monotonic change-set bookkeeping.
///
/// `next` hands out strictly increasing batch ids; `mark_processed` records
/// the highest id already reacted to, so a best-solution event reflecting
/// an already-processed batch is ignored.
#[derive(Debug, Default)]
pub struct ChangeSetTracker {
    next: u64,
    last_processed: Option<u64>,
}

impl ChangeSetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next change-set id, starting at 1.
    pub fn next(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    pub fn is_processed(&self, id: u64) -> bool {
        self.last_processed.map_or(false, |last| id <= last)
    }

    pub fn mark_processed(&mut self, id: u64) {
        self.last_processed = Some(self.last_processed.map_or(id, |last| last.max(id)));
    }

    /// Forgets processed history; used when the assignment is voided so the
    /// next recovery reacts to its first best solution again.
    pub fn clear_processed(&mut self) {
        self.last_processed = None;
    }
}

#[derive(Default)]
struct CoordinatorState {
    current_solution: Option<TaskAssignment>,
    tracker: ChangeSetTracker,
    last_query_time: Option<DateTime<Utc>>,
}

/// Ties the solver runner, the sync loop and the external solution
/// processor together.
pub struct Coordinator {
    state: Mutex<CoordinatorState>,
    runner: Arc<SolverRunner>,
    sync: Arc<SyncLoop>,
    processor: Arc<dyn SolutionProcessor>,
}

impl Coordinator {
    /// Wires the full runtime: spawns the runner and sync-loop threads and
    /// registers the event bridges back into the coordinator.
    pub fn new(
        factory: Arc<dyn SolverFactory>,
        task_source: Arc<dyn TaskSource>,
        directory: Arc<dyn UserDirectory>,
        processor: Arc<dyn SolutionProcessor>,
        config: &RuntimeConfig,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let solver_bridge = Arc::new(BestSolutionBridge::default());
        let sync_bridge = Arc::new(SyncBridge::default());

        let listener: Arc<dyn SolverEventListener> = solver_bridge.clone();
        let runner = Arc::new(SolverRunner::new(factory, listener)?);
        let handler: Arc<dyn SyncEventHandler> = sync_bridge.clone();
        let sync = Arc::new(SyncLoop::new(
            task_source,
            directory,
            Arc::clone(&runner),
            handler,
            config.sync_interval(),
        )?);

        let coordinator = Arc::new(Self {
            state: Mutex::new(CoordinatorState::default()),
            runner,
            sync,
            processor,
        });
        solver_bridge.bind(&coordinator);
        sync_bridge.bind(&coordinator);
        Ok(coordinator)
    }

    /// Begins operating: the sync loop recovers and starts the solver.
    pub fn start(&self) {
        info!(event = "coordinator_started");
        self.sync.init_solver_execution();
    }

    /// Idempotent shutdown signal for both background threads.
    pub fn destroy(&self) {
        self.sync.destroy();
        self.runner.destroy();
    }

    /// Signals shutdown and waits up to `grace` per thread.
    pub fn shutdown(&self, grace: Duration) -> bool {
        self.destroy();
        let sync_joined = self.sync.join(grace);
        let runner_joined = self.runner.join(grace);
        sync_joined && runner_joined
    }

    pub fn runner(&self) -> &Arc<SolverRunner> {
        &self.runner
    }

    pub fn current_solution(&self) -> Option<TaskAssignment> {
        self.state.lock().unwrap().current_solution.clone()
    }

    /// Best-solution event, re-entered from the solver's thread.
    ///
    /// Accepted only when the solver has applied every queued fact change,
    /// the solution is fully initialized, and the stamped change-set id has
    /// not been reacted to yet.
    pub fn on_best_solution(self: &Arc<Self>, event: BestSolutionEvent) {
        if !event.all_changes_processed || !event.initialized {
            debug!(
                event = "best_solution_skipped",
                all_changes_processed = event.all_changes_processed,
                initialized = event.initialized
            );
            return;
        }
        let change_set = event.solution.change_set();
        {
            let mut state = self.state.lock().unwrap();
            if state.tracker.is_processed(change_set) {
                debug!(event = "best_solution_already_processed", change_set);
                return;
            }
            state.tracker.mark_processed(change_set);
            state.current_solution = Some(event.solution.clone());
        }
        info!(event = "best_solution_accepted", change_set);

        let coordinator = Arc::downgrade(self);
        self.processor.process(
            event.solution,
            Box::new(move |result| {
                if let Some(coordinator) = coordinator.upgrade() {
                    coordinator.on_processed(result);
                }
            }),
        );
    }

    /// Completion callback, re-entered from the processor's thread.
    pub fn on_processed(&self, result: ProcessingResult) {
        match result {
            ProcessingResult::Success | ProcessingResult::Recoverable(_) => {
                if let ProcessingResult::Recoverable(reason) = &result {
                    // Expected staleness; the next synchronize picks it up.
                    info!(event = "processing_recoverable", reason = %reason);
                }
                let (solution, since) = {
                    let state = self.state.lock().unwrap();
                    (state.current_solution.clone(), state.last_query_time)
                };
                match solution {
                    Some(solution) => self.sync.synchronize(solution, since),
                    None => warn!(event = "processing_finished_without_solution"),
                }
            }
            ProcessingResult::Fatal(reason) => {
                // Solver-state corruption risk: void everything and recover.
                error!(event = "processing_fatal", reason = %reason);
                self.runner.stop();
                {
                    let mut state = self.state.lock().unwrap();
                    state.tracker.clear_processed();
                    state.current_solution = None;
                }
                self.sync.init_solver_execution();
            }
        }
    }

    /// Non-empty batch reported by the sync loop.
    pub fn on_sync_changes(&self, batch: Vec<FactChange>, query_time: DateTime<Utc>) {
        self.state.lock().unwrap().last_query_time = Some(query_time);
        if batch.is_empty() {
            debug!(event = "sync_changes_empty");
            return;
        }
        if !self.runner.is_started() {
            // The solver went away since the poll; the changes are no
            // longer relevant and the next recovery re-reads everything.
            info!(event = "sync_changes_dropped");
            return;
        }
        if let Err(err) = self.runner.add_fact_changes(batch) {
            warn!(event = "sync_changes_rejected", error = %err);
        }
    }

    /// Hands out the change-set id for the next non-empty batch.
    pub fn next_change_set(&self) -> u64 {
        self.state.lock().unwrap().tracker.next()
    }
}

/// Adapter delivering solver events into the coordinator without a
/// construction-order cycle.
#[derive(Debug, Default)]
struct BestSolutionBridge {
    coordinator: Mutex<Weak<Coordinator>>,
}

impl BestSolutionBridge {
    fn bind(&self, coordinator: &Arc<Coordinator>) {
        *self.coordinator.lock().unwrap() = Arc::downgrade(coordinator);
    }
}

impl SolverEventListener for BestSolutionBridge {
    fn on_best_solution_changed(&self, event: BestSolutionEvent) {
        let coordinator = self.coordinator.lock().unwrap().upgrade();
        if let Some(coordinator) = coordinator {
            coordinator.on_best_solution(event);
        }
    }
}

/// Adapter delivering sync-loop results into the coordinator.
#[derive(Debug, Default)]
struct SyncBridge {
    coordinator: Mutex<Weak<Coordinator>>,
}

impl SyncBridge {
    fn bind(&self, coordinator: &Arc<Coordinator>) {
        *self.coordinator.lock().unwrap() = Arc::downgrade(coordinator);
    }
}

impl SyncEventHandler for SyncBridge {
    fn on_changes(&self, batch: Vec<FactChange>, query_time: DateTime<Utc>) {
        let coordinator = self.coordinator.lock().unwrap().upgrade();
        if let Some(coordinator) = coordinator {
            coordinator.on_sync_changes(batch, query_time);
        }
    }

    fn next_change_set(&self) -> u64 {
        let coordinator = self.coordinator.lock().unwrap().upgrade();
        match coordinator {
            Some(coordinator) => coordinator.next_change_set(),
            None => 0,
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
