//! External task lifecycle statuses.

use std::fmt;

use crate::error::ModelError;

/// Lifecycle status of an externally-tracked task.
///
/// The enumeration is exhaustive by contract with the external
/// task-management system: a wire value outside this set is a hard input
/// error, not a silently skipped record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Ready,
    Reserved,
    InProgress,
    Suspended,
    Completed,
    Exited,
    Failed,
    Error,
    Obsolete,
}

impl TaskStatus {
    /// Statuses queried during full recovery.
    pub const NON_TERMINAL: &'static [TaskStatus] = &[
        TaskStatus::Ready,
        TaskStatus::Reserved,
        TaskStatus::InProgress,
        TaskStatus::Suspended,
    ];

    /// Parses the external wire value.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownStatus`] for any value outside the
    /// known enumeration.
    pub fn from_external(value: &str) -> Result<Self, ModelError> {
        match value {
            "Ready" => Ok(TaskStatus::Ready),
            "Reserved" => Ok(TaskStatus::Reserved),
            "InProgress" => Ok(TaskStatus::InProgress),
            "Suspended" => Ok(TaskStatus::Suspended),
            "Completed" => Ok(TaskStatus::Completed),
            "Exited" => Ok(TaskStatus::Exited),
            "Failed" => Ok(TaskStatus::Failed),
            "Error" => Ok(TaskStatus::Error),
            "Obsolete" => Ok(TaskStatus::Obsolete),
            other => Err(ModelError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }

    /// Returns the external wire value.
    pub fn as_external(&self) -> &'static str {
        match self {
            TaskStatus::Ready => "Ready",
            TaskStatus::Reserved => "Reserved",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Suspended => "Suspended",
            TaskStatus::Completed => "Completed",
            TaskStatus::Exited => "Exited",
            TaskStatus::Failed => "Failed",
            TaskStatus::Error => "Error",
            TaskStatus::Obsolete => "Obsolete",
        }
    }

    /// Terminal statuses remove a task from the model permanently.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed
                | TaskStatus::Exited
                | TaskStatus::Failed
                | TaskStatus::Error
                | TaskStatus::Obsolete
        )
    }

    /// Statuses under which a task is (or may be) attached to an owner.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            TaskStatus::Reserved | TaskStatus::InProgress | TaskStatus::Suspended
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_external())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trip() {
        for status in [
            TaskStatus::Ready,
            TaskStatus::Reserved,
            TaskStatus::InProgress,
            TaskStatus::Suspended,
            TaskStatus::Completed,
            TaskStatus::Exited,
            TaskStatus::Failed,
            TaskStatus::Error,
            TaskStatus::Obsolete,
        ] {
            assert_eq!(TaskStatus::from_external(status.as_external()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_a_typed_error() {
        let err = TaskStatus::from_external("Paused").unwrap_err();
        assert!(matches!(err, ModelError::UnknownStatus { value } if value == "Paused"));
    }

    #[test]
    fn terminal_partition() {
        assert!(!TaskStatus::Ready.is_terminal());
        assert!(!TaskStatus::Suspended.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Obsolete.is_terminal());
        assert_eq!(TaskStatus::NON_TERMINAL.len(), 4);
        assert!(TaskStatus::NON_TERMINAL.iter().all(|s| !s.is_terminal()));
    }
}
