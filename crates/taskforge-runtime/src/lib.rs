//! taskforge runtime
//!
//! The solver coordination layer: keeps a long-running, interruptible
//! constraint solver consistent with an external task-management system
//! that is the source of truth.
//!
//! - `recovery` rebuilds a valid starting assignment from a full snapshot
//! - `diff` turns incremental external changes into ordered fact-change
//!   batches
//! - `publish` bounds how much of each queue is exposed externally
//! - `runner` owns the solver's start/stop/destroy lifecycle and thread
//! - `sync` polls the external system in Init/Synchronize modes
//! - `coordinator` correlates best-solution events with change sets and
//!   implements the fatal-vs-recoverable error policy
//! - `remote` and `solver` are the seams to the external collaborators

pub mod coordinator;
pub mod diff;
pub mod error;
pub mod publish;
pub mod recovery;
pub mod remote;
pub mod runner;
pub mod solver;
pub mod sync;

#[cfg(test)]
mod test_utils;

pub use coordinator::{ChangeSetTracker, Coordinator};
pub use diff::ChangeBuilder;
pub use error::{Result, RuntimeError};
pub use publish::PublishSelector;
pub use recovery::SolutionBuilder;
pub use remote::{
    PlanningRecord, ProcessedCallback, ProcessingResult, RemoteError, SolutionProcessor,
    TaskQuery, TaskRecord, TaskSource, UserDirectory, UserRecord,
};
pub use runner::{RunnerState, SolverRunner};
pub use solver::{AssignmentSolver, BestSolutionEvent, SolverEventListener, SolverFactory};
pub use sync::{SyncEventHandler, SyncLoop};
