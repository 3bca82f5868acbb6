//! Interfaces to the external task-management system.
//!
//! The runtime never talks to the network itself; it consumes these traits.
//! The external system remains the source of truth for task state, so every
//! record type here mirrors what that system reports, wire statuses
//! included (parsed with [`taskforge_core::TaskStatus::from_external`]).

use chrono::{DateTime, Utc};
use thiserror::Error;

use taskforge_core::{TaskAssignment, TaskId, TaskStatus, UserId};

/// Failure talking to an external collaborator. Always recovered locally by
/// retrying after the poll interval.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("task source error: {0}")]
    TaskSource(String),

    #[error("user directory error: {0}")]
    UserDirectory(String),
}

/// The planning decision previously pushed for a task, as the external
/// system remembers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningRecord {
    pub assigned_user: UserId,
    pub index: i32,
    pub published: bool,
}

/// One task as reported by the external system.
///
/// `status` carries the raw wire value; parsing it is the runtime's job so
/// that unknown values surface as typed input errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub container_id: String,
    pub process_instance_id: i64,
    pub status: String,
    pub priority: i32,
    pub actual_owner: Option<UserId>,
    pub last_modified: DateTime<Utc>,
    pub planning: Option<PlanningRecord>,
}

impl TaskRecord {
    /// The actual owner, treating the empty string as absent.
    pub fn owner(&self) -> Option<&str> {
        self.actual_owner.as_deref().filter(|o| !o.is_empty())
    }
}

/// Result of a task query: the records plus a timestamp usable as the next
/// high-water-mark.
#[derive(Debug, Clone)]
pub struct TaskQuery {
    pub query_time: DateTime<Utc>,
    pub tasks: Vec<TaskRecord>,
}

/// One user as reported by the external user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub active: bool,
}

/// Read side of the external task-management system.
pub trait TaskSource: Send + Sync {
    /// Fetches tasks in one of two shapes:
    ///
    /// - `since = None`: the full set of tasks in the listed statuses
    ///   (recovery).
    /// - `since = Some(t)`: anything modified since `t`, regardless of
    ///   status (incremental); `statuses` is ignored.
    fn find_tasks(
        &self,
        statuses: &[TaskStatus],
        since: Option<DateTime<Utc>>,
    ) -> Result<TaskQuery, RemoteError>;
}

/// The external user directory.
pub trait UserDirectory: Send + Sync {
    /// Roster snapshot, used at recovery.
    fn find_all_users(&self) -> Result<Vec<UserRecord>, RemoteError>;

    /// On-demand lookup during incremental diffing.
    fn find_user(&self, id: &str) -> Result<Option<UserRecord>, RemoteError>;
}

/// Outcome of processing a finalized assignment externally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    Success,
    /// A task was externally modified after the plan was computed; expected
    /// staleness, resolved by the next synchronize cycle.
    Recoverable(String),
    /// Anything else. The in-memory assignment can no longer be trusted and
    /// a full recovery is required.
    Fatal(String),
}

/// Completion callback invoked on the processor's own thread.
pub type ProcessedCallback = Box<dyn FnOnce(ProcessingResult) + Send>;

/// The external component that transmits a finalized plan.
///
/// Implementations run the publish selection as part of processing and push
/// the resulting planning items to the external system's write side.
pub trait SolutionProcessor: Send + Sync {
    fn process(&self, solution: TaskAssignment, on_done: ProcessedCallback);
}
