//! Full recovery: rebuilding a valid starting assignment from external state.
//!
//! Used at startup and after a fatal plan-application error, when the
//! in-memory assignment can no longer be trusted. The external system is the
//! source of truth; this builder reconstructs the closest valid solution
//! from a full snapshot of its non-terminal tasks plus the active roster.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use taskforge_core::{
    ModelError, Task, TaskAssignment, TaskStatus, User, UserId, PLANNING_USER_ID,
};

use crate::remote::{PlanningRecord, TaskRecord, UserRecord};

/// A recovered task waiting to be linked into its owner's chain.
struct Slot {
    task: Task,
    pinned: bool,
    published: bool,
    index: Option<i32>,
}

/// Builds a fresh [`TaskAssignment`] from a full external snapshot.
pub struct SolutionBuilder {
    tasks: Vec<TaskRecord>,
    users: Vec<UserRecord>,
}

impl SolutionBuilder {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            users: Vec::new(),
        }
    }

    /// The full list of current external task records.
    pub fn tasks(mut self, tasks: Vec<TaskRecord>) -> Self {
        self.tasks = tasks;
        self
    }

    /// The external user roster; inactive users are filtered out.
    pub fn users(mut self, users: Vec<UserRecord>) -> Self {
        self.users = users;
        self
    }

    /// Builds the assignment.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownStatus`] on an unrecognized wire status
    /// and [`ModelError::UnexpectedStatus`] on a status that cannot occur in
    /// a non-terminal snapshot. Both abort the build: the status enumeration
    /// is exhaustive by contract.
    pub fn build(self) -> Result<TaskAssignment, ModelError> {
        let mut assignment = TaskAssignment::new();
        let roster: BTreeSet<UserId> = self
            .users
            .iter()
            .filter(|u| u.active)
            .map(|u| u.id.clone())
            .collect();
        for id in &roster {
            assignment.add_user(User::new(id.clone(), true));
        }

        let mut per_owner: BTreeMap<UserId, Vec<Slot>> = BTreeMap::new();
        for record in &self.tasks {
            let status = TaskStatus::from_external(&record.status)?;
            match status {
                TaskStatus::Ready => {
                    assignment.add_task(to_task(record, status));
                }
                TaskStatus::Reserved | TaskStatus::InProgress | TaskStatus::Suspended => {
                    match record.owner() {
                        Some(owner) => {
                            let matching = record
                                .planning
                                .as_ref()
                                .filter(|p| p.assigned_user == owner);
                            let slot = Slot {
                                task: to_task(record, status),
                                pinned: recovered_pinned(status, owner, matching, &roster),
                                published: matching.is_some_and(|p| p.published),
                                index: matching.map(|p| p.index),
                            };
                            ordered_insert(per_owner.entry(owner.to_owned()).or_default(), slot);
                        }
                        None if status == TaskStatus::Suspended => {
                            // Reappears through a later sync once it returns
                            // to Ready/Reserved.
                            debug!(event = "recovery_skip_suspended", task_id = record.task_id);
                        }
                        None => {
                            assignment.add_task(to_task(record, status));
                        }
                    }
                }
                other => {
                    return Err(ModelError::UnexpectedStatus {
                        task_id: record.task_id,
                        status: other,
                    });
                }
            }
        }

        for (owner, slots) in per_owner {
            if assignment.user(&owner).is_none() {
                assignment.add_user(User::external(owner.clone()));
            }
            for slot in slots {
                let task_id = slot.task.id;
                assignment.add_task(slot.task);
                assignment.assign(task_id, &owner, -1, slot.pinned, slot.published)?;
            }
        }

        // The model must never be empty.
        assignment.add_task(Task::sentinel());

        info!(
            event = "solution_recovered",
            tasks = assignment.non_sentinel_task_count(),
            users = assignment.users().count()
        );
        Ok(assignment)
    }
}

impl Default for SolutionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Recovery-time pinning policy.
///
/// `matching` is the previously recorded planning assignment, present only
/// when its owner equals the actual owner. Without one the assignment was
/// made manually/out-of-band.
fn recovered_pinned(
    status: TaskStatus,
    owner: &str,
    matching: Option<&PlanningRecord>,
    roster: &BTreeSet<UserId>,
) -> bool {
    let held = matches!(status, TaskStatus::InProgress | TaskStatus::Suspended);
    match matching {
        // Never re-litigate an already-published decision or one held by an
        // owner the roster does not know.
        Some(planning) => held || planning.published || !roster.contains(owner),
        None => held || (status == TaskStatus::Reserved && owner != PLANNING_USER_ID),
    }
}

/// Stable ordered insert: pinned first, then recorded index, records
/// without an index appended last.
fn ordered_insert(slots: &mut Vec<Slot>, slot: Slot) {
    fn key(slot: &Slot) -> (bool, i64) {
        (!slot.pinned, slot.index.map_or(i64::MAX, i64::from))
    }
    let position = slots
        .iter()
        .position(|existing| key(&slot) < key(existing))
        .unwrap_or(slots.len());
    slots.insert(position, slot);
}

fn to_task(record: &TaskRecord, status: TaskStatus) -> Task {
    Task::new(
        record.task_id,
        record.container_id.clone(),
        record.process_instance_id,
        status,
        record.priority,
    )
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
