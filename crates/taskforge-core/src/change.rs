//! Fact changes: atomic mutations applied to a running solver's working
//! assignment.
//!
//! A batch is an ordered `Vec<FactChange>`; order is significant because the
//! solver applies each change at a safe point and later changes may depend
//! on the model state left by earlier ones.

use crate::assignment::TaskAssignment;
use crate::error::{ModelError, Result};
use crate::status::TaskStatus;
use crate::task::{Task, TaskId};
use crate::user::User;

/// An atomic, immutable mutation of the working assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum FactChange {
    /// Introduce a new Ready task, unassigned.
    Add { task: Task },
    /// Attach a task to a user at a position (−1 appends), adding the task
    /// and the user first when the model does not know them yet.
    Assign {
        task: Task,
        user: User,
        index: i32,
        pinned: bool,
        published: bool,
    },
    /// Detach a task back to unassigned/Ready.
    Release { task_id: TaskId },
    /// Delete a task entirely (terminal external status).
    Remove { task_id: TaskId },
    /// Update priority and/or status without moving the task.
    PropertyChange {
        task_id: TaskId,
        priority: Option<i32>,
        status: Option<TaskStatus>,
    },
    /// No-op marker stamping the change-set id of the batch onto the
    /// assignment, so best-solution snapshots identify the batch they
    /// reflect.
    ChangeSet(u64),
}

impl FactChange {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            FactChange::Add { .. } => "add",
            FactChange::Assign { .. } => "assign",
            FactChange::Release { .. } => "release",
            FactChange::Remove { .. } => "remove",
            FactChange::PropertyChange { .. } => "property_change",
            FactChange::ChangeSet(_) => "change_set",
        }
    }
}

impl TaskAssignment {
    /// Applies one fact change.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownTask`] when a Release, Remove or
    /// PropertyChange references a task the model does not hold.
    pub fn apply(&mut self, change: &FactChange) -> Result<()> {
        match change {
            FactChange::Add { task } => {
                self.add_task(task.clone());
                Ok(())
            }
            FactChange::Assign {
                task,
                user,
                index,
                pinned,
                published,
            } => {
                if self.task(task.id).is_none() {
                    self.add_task(task.clone());
                }
                self.add_user(User::new(user.id.clone(), user.enabled));
                self.assign(task.id, &user.id, *index, *pinned, *published)
            }
            FactChange::Release { task_id } => self.release(*task_id),
            FactChange::Remove { task_id } => self.remove(*task_id).map(|_| ()),
            FactChange::PropertyChange {
                task_id,
                priority,
                status,
            } => {
                let task = self
                    .task_mut(*task_id)
                    .ok_or(ModelError::UnknownTask { task_id: *task_id })?;
                if let Some(priority) = priority {
                    task.priority = *priority;
                }
                if let Some(status) = status {
                    task.status = *status;
                }
                Ok(())
            }
            FactChange::ChangeSet(id) => {
                self.set_change_set(*id);
                Ok(())
            }
        }
    }

    /// Applies an ordered batch, stopping at the first failure.
    pub fn apply_all(&mut self, batch: &[FactChange]) -> Result<()> {
        for change in batch {
            self.apply(change)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod tests;
