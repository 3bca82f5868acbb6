//! Solver lifecycle: one solver instance on a dedicated execution thread.
//!
//! The runner owns a long-lived thread that loops: wait for a start signal,
//! run the blocking solve call, return to Stopped, wait again — until
//! destroyed. State lives in an atomic so `is_started`/`is_stopped` queries
//! never block; every state *transition* happens under the handoff mutex so
//! start/stop/destroy cannot interleave with the thread picking up a start
//! request.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use taskforge_core::{FactChange, TaskAssignment};

use crate::error::{Result, RuntimeError};
use crate::solver::{AssignmentSolver, SolverEventListener, SolverFactory};

/// Lifecycle states of the solver runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunnerState {
    Stopped = 0,
    Starting = 1,
    Started = 2,
    Stopping = 3,
    Destroyed = 4,
}

impl RunnerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunnerState::Stopped,
            1 => RunnerState::Starting,
            2 => RunnerState::Started,
            3 => RunnerState::Stopping,
            _ => RunnerState::Destroyed,
        }
    }
}

#[derive(Default)]
struct Pending {
    request: Option<StartRequest>,
    /// The solver currently starting or solving; target for fact changes
    /// and early termination.
    active: Option<Arc<dyn AssignmentSolver>>,
}

struct StartRequest {
    solver: Arc<dyn AssignmentSolver>,
    assignment: TaskAssignment,
}

struct RunnerShared {
    state: AtomicU8,
    factory: Arc<dyn SolverFactory>,
    listener: Arc<dyn SolverEventListener>,
    pending: Mutex<Pending>,
    signal: Condvar,
}

impl RunnerShared {
    fn state(&self) -> RunnerState {
        RunnerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Caller must hold the `pending` lock.
    fn set_state(&self, state: RunnerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Caller must hold the `pending` lock.
    fn try_transition(&self, from: RunnerState, to: RunnerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Owns the start/stop/destroy lifecycle of one solver instance.
pub struct SolverRunner {
    shared: Arc<RunnerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SolverRunner {
    /// Creates the runner and spawns its execution thread.
    pub fn new(
        factory: Arc<dyn SolverFactory>,
        listener: Arc<dyn SolverEventListener>,
    ) -> Result<Self> {
        let shared = Arc::new(RunnerShared {
            state: AtomicU8::new(RunnerState::Stopped as u8),
            factory,
            listener,
            pending: Mutex::new(Pending::default()),
            signal: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("taskforge-solver".to_string())
            .spawn(move || run(thread_shared))?;
        Ok(Self {
            shared,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Builds a fresh solver, registers the best-solution listener and
    /// signals the execution thread to solve `assignment`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidState`] unless the runner is Stopped.
    pub fn start(&self, assignment: TaskAssignment) -> Result<()> {
        let mut pending = self.shared.pending.lock().unwrap();
        if !self
            .shared
            .try_transition(RunnerState::Stopped, RunnerState::Starting)
        {
            return Err(RuntimeError::InvalidState(format!(
                "start is only valid when stopped, current state: {:?}",
                self.state()
            )));
        }
        let solver = self.shared.factory.create_solver();
        solver.add_listener(Arc::clone(&self.shared.listener));
        pending.active = Some(Arc::clone(&solver));
        pending.request = Some(StartRequest { solver, assignment });
        self.shared.signal.notify_all();
        debug!(event = "solver_start_requested");
        Ok(())
    }

    /// Forwards an ordered fact-change batch to the running solver.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidState`] when the runner is not
    /// Started; callers gate on [`is_started`](Self::is_started).
    pub fn add_fact_changes(&self, batch: Vec<FactChange>) -> Result<()> {
        let pending = self.shared.pending.lock().unwrap();
        if self.shared.state() != RunnerState::Started {
            return Err(RuntimeError::InvalidState(format!(
                "fact changes require a started solver, current state: {:?}",
                self.state()
            )));
        }
        match &pending.active {
            Some(solver) => {
                debug!(event = "fact_changes_submitted", size = batch.len());
                solver.add_fact_changes(batch);
                Ok(())
            }
            None => Err(RuntimeError::InvalidState(
                "no active solver instance".to_string(),
            )),
        }
    }

    /// Requests early termination of the current solve, or unwinds a start
    /// the execution thread has not picked up yet. No-op otherwise.
    pub fn stop(&self) {
        let mut pending = self.shared.pending.lock().unwrap();
        match self.shared.state() {
            RunnerState::Started => {
                self.shared.set_state(RunnerState::Stopping);
                if let Some(solver) = &pending.active {
                    solver.terminate_early();
                }
                info!(event = "solver_stop_requested");
            }
            RunnerState::Starting => {
                pending.request = None;
                pending.active = None;
                self.shared.set_state(RunnerState::Stopped);
                self.shared.signal.notify_all();
                info!(event = "solver_start_unwound");
            }
            _ => {}
        }
    }

    /// Terminal and idempotent: signals the execution thread to exit,
    /// terminating any in-flight solve.
    pub fn destroy(&self) {
        let mut pending = self.shared.pending.lock().unwrap();
        let previous =
            RunnerState::from_u8(self.shared.state.swap(
                RunnerState::Destroyed as u8,
                Ordering::SeqCst,
            ));
        if matches!(previous, RunnerState::Started | RunnerState::Stopping) {
            if let Some(solver) = &pending.active {
                solver.terminate_early();
            }
        }
        pending.request = None;
        self.shared.signal.notify_all();
        if previous != RunnerState::Destroyed {
            info!(event = "solver_runner_destroyed");
        }
    }

    /// Waits up to `grace` for the execution thread to exit after
    /// [`destroy`](Self::destroy). Returns false when the thread is still
    /// running (it is then abandoned).
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

    pub fn state(&self) -> RunnerState {
        self.shared.state()
    }

    pub fn is_started(&self) -> bool {
        self.state() == RunnerState::Started
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == RunnerState::Stopped
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == RunnerState::Destroyed
    }
}

/// Execution thread body: wait for a start, solve, return to Stopped, loop.
fn run(shared: Arc<RunnerShared>) {
    loop {
        let (solver, assignment) = {
            let mut pending = shared.pending.lock().unwrap();
            loop {
                if shared.state() == RunnerState::Destroyed {
                    return;
                }
                if let Some(request) = pending.request.take() {
                    if shared.try_transition(RunnerState::Starting, RunnerState::Started) {
                        break (request.solver, request.assignment);
                    }
                    // Stopped or destroyed before pickup; discard and wait on.
                    pending.active = None;
                    continue;
                }
                pending = shared.signal.wait(pending).unwrap();
            }
        };

        info!(event = "solver_started");
        solver.solve(assignment);

        let mut pending = shared.pending.lock().unwrap();
        pending.active = None;
        if shared.state() == RunnerState::Destroyed {
            return;
        }
        shared.set_state(RunnerState::Stopped);
        drop(pending);
        info!(event = "solver_stopped");
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
