//! Error types for the taskforge domain model.

use thiserror::Error;

use crate::status::TaskStatus;
use crate::task::TaskId;

/// Main error type for model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The external system reported a status value outside the known
    /// enumeration. Never ignored: the status set is exhaustive by contract.
    #[error("unknown task status: {value:?}")]
    UnknownStatus { value: String },

    /// A task carried a status that is not valid for the operation in
    /// progress (e.g. a terminal status during full recovery).
    #[error("task {task_id} has unexpected status {status}")]
    UnexpectedStatus { task_id: TaskId, status: TaskStatus },

    /// A mutation referenced a task id that is not in the assignment.
    #[error("unknown task: {task_id}")]
    UnknownTask { task_id: TaskId },
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
