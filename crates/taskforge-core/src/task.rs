//! Tasks: units of externally-tracked work.

use crate::status::TaskStatus;

/// Stable identifier of a task in the external system.
pub type TaskId = i64;

/// Id of the sentinel task that keeps the model non-empty.
pub const SENTINEL_TASK_ID: TaskId = -1;

/// Id of the second placeholder of the sentinel pair.
///
/// The backing solver misbehaves when the catch-all user holds fewer than
/// two placeholder facts, so the diff layer re-asserts this assignment
/// whenever the task is absent.
pub const SENTINEL_PAIR_TASK_ID: TaskId = -2;

/// Default task duration used for start/end offset propagation when the
/// external record carries none.
pub const DEFAULT_DURATION_MILLIS: i64 = 60_000;

/// A unit of externally-tracked work.
///
/// `index`, `start_millis` and `end_millis` are derived fields maintained by
/// the owning assignment when chains are rebuilt; `-1` marks an unassigned
/// position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub container_id: String,
    pub process_instance_id: i64,
    pub status: TaskStatus,
    pub priority: i32,
    /// Must not be reassigned by the solver.
    pub pinned: bool,
    /// Already exposed externally; never silently un-published.
    pub published: bool,
    pub index: i32,
    pub start_millis: i64,
    pub end_millis: i64,
    pub duration_millis: i64,
}

impl Task {
    /// Creates an unassigned task.
    pub fn new(
        id: TaskId,
        container_id: impl Into<String>,
        process_instance_id: i64,
        status: TaskStatus,
        priority: i32,
    ) -> Self {
        Self {
            id,
            container_id: container_id.into(),
            process_instance_id,
            status,
            priority,
            pinned: false,
            published: false,
            index: -1,
            start_millis: 0,
            end_millis: 0,
            duration_millis: DEFAULT_DURATION_MILLIS,
        }
    }

    /// Sentinel tasks are excluded from all external-facing computations.
    pub fn is_sentinel(&self) -> bool {
        self.id < 0
    }

    /// The placeholder that guarantees the model is never empty.
    pub fn sentinel() -> Self {
        Task::new(SENTINEL_TASK_ID, "", -1, TaskStatus::Ready, 0)
    }

    /// The second placeholder of the sentinel pair.
    pub fn sentinel_pair() -> Self {
        Task::new(SENTINEL_PAIR_TASK_ID, "", -1, TaskStatus::Ready, 0)
    }
}
