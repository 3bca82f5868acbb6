//! Seam to the black-box incremental solver.
//!
//! The solving algorithm is an external collaborator: the runtime only
//! needs a blocking `solve`, a queue for fact changes while solving, early
//! termination, and best-solution events. Fact changes are applied by the
//! solver at safe points (step boundaries), in batch order.

use std::fmt::Debug;
use std::sync::Arc;

use taskforge_core::{FactChange, TaskAssignment};

/// Payload of a best-solution event.
///
/// The solution is a snapshot owned by the receiver; the solver keeps
/// working on its own copy. `solution.change_set()` identifies the last
/// fact-change batch the snapshot reflects.
#[derive(Debug, Clone)]
pub struct BestSolutionEvent {
    pub solution: TaskAssignment,
    /// True when every queued fact change has been applied to the snapshot.
    pub all_changes_processed: bool,
    /// True when the solution has no uninitialized planning variables left.
    pub initialized: bool,
}

/// Listener for best-solution events.
pub trait SolverEventListener: Send + Sync + Debug {
    fn on_best_solution_changed(&self, event: BestSolutionEvent);
}

/// A running, interruptible solver instance.
///
/// `solve` blocks the calling thread until [`terminate_early`] is invoked
/// from another thread; all other methods are thread-safe and non-blocking.
///
/// [`terminate_early`]: AssignmentSolver::terminate_early
pub trait AssignmentSolver: Send + Sync + Debug {
    /// Solves starting from `assignment`. Blocks until early termination.
    fn solve(&self, assignment: TaskAssignment);

    /// Queues an ordered batch to be applied at the next safe point.
    fn add_fact_changes(&self, batch: Vec<FactChange>);

    /// Requests that a running `solve` call return.
    fn terminate_early(&self);

    /// Registers a best-solution listener. Must be called before `solve`.
    fn add_listener(&self, listener: Arc<dyn SolverEventListener>);
}

/// Builds a fresh solver instance for each start.
///
/// Solvers keep internal search state; reusing one across starts would leak
/// state from a discarded assignment into the next recovery.
pub trait SolverFactory: Send + Sync {
    fn create_solver(&self) -> Arc<dyn AssignmentSolver>;
}
