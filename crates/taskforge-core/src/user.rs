//! Users: assignees of tasks, including the synthetic planning user.

use crate::task::TaskId;

/// Stable identifier of a user.
pub type UserId = String;

/// Id of the singleton catch-all planning user.
///
/// Work that cannot be confidently routed (e.g. an actual owner unknown to
/// the roster at recovery time) parks on this user until a later cycle
/// resolves it.
pub const PLANNING_USER_ID: &str = "planning-user";

/// An assignee owning an ordered queue of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub enabled: bool,
    pub(crate) queue: Vec<TaskId>,
}

impl User {
    pub fn new(id: impl Into<UserId>, enabled: bool) -> Self {
        Self {
            id: id.into(),
            enabled,
            queue: Vec::new(),
        }
    }

    /// The singleton catch-all user; always present in an assignment.
    pub fn planning() -> Self {
        User::new(PLANNING_USER_ID, true)
    }

    /// An ad-hoc user created by convention for an actual owner that is not
    /// in the current roster. The id is derived deterministically from the
    /// owner string.
    pub fn external(id: impl Into<UserId>) -> Self {
        User::new(id, true)
    }

    pub fn is_planning(&self) -> bool {
        self.id == PLANNING_USER_ID
    }

    /// The task ids owned by this user, in chain order.
    pub fn queue(&self) -> &[TaskId] {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planning_user_is_planning() {
        assert!(User::planning().is_planning());
        assert!(!User::external("alice").is_planning());
    }
}
