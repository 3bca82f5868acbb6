//! Incremental diffing: translating freshly observed external records into
//! the minimal ordered batch of fact changes.
//!
//! Pure computation over already-fetched data; the only hard error is an
//! unrecognized external status. Batch order reflects solver-side dependency
//! ordering and must be preserved: Removes, then Releases, then per-user
//! Assigns, then PropertyChanges, then Adds.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use taskforge_core::{
    FactChange, ModelError, Task, TaskAssignment, TaskStatus, User, UserId, SENTINEL_PAIR_TASK_ID,
};

use crate::remote::{TaskRecord, UserDirectory};

/// Computes the fact-change batch that brings a solver working from
/// `assignment` up to date with a set of changed external records.
pub struct ChangeBuilder<'a> {
    assignment: &'a TaskAssignment,
    directory: &'a dyn UserDirectory,
}

impl<'a> ChangeBuilder<'a> {
    pub fn new(assignment: &'a TaskAssignment, directory: &'a dyn UserDirectory) -> Self {
        Self {
            assignment,
            directory,
        }
    }

    /// Builds the ordered batch.
    ///
    /// `next_change_set` is consulted lazily: only a non-empty batch gets a
    /// [`FactChange::ChangeSet`] marker prepended, which is how a later
    /// best-solution snapshot is correlated with this submission.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownStatus`] on an unrecognized wire status.
    pub fn build(
        &self,
        records: &[TaskRecord],
        next_change_set: impl FnOnce() -> u64,
    ) -> Result<Vec<FactChange>, ModelError> {
        let mut removes = Vec::new();
        let mut releases = Vec::new();
        let mut assigns: BTreeMap<UserId, Vec<FactChange>> = BTreeMap::new();
        let mut properties = Vec::new();
        let mut adds = Vec::new();

        for record in records {
            let status = TaskStatus::from_external(&record.status)?;
            match self.assignment.task(record.task_id) {
                None => self.diff_unknown(record, status, &mut adds, &mut assigns),
                Some(task) => self.diff_known(
                    record,
                    status,
                    task,
                    &mut removes,
                    &mut releases,
                    &mut assigns,
                    &mut properties,
                ),
            }
        }

        let mut batch = Vec::new();
        if self.assignment.task(SENTINEL_PAIR_TASK_ID).is_none() {
            // The solver needs two placeholder facts on the planning user;
            // re-assert the second whenever it is missing.
            batch.push(FactChange::Assign {
                task: Task::sentinel_pair(),
                user: User::planning(),
                index: -1,
                pinned: true,
                published: false,
            });
        }
        batch.extend(removes);
        batch.extend(releases);
        for (_, mut entries) in assigns {
            // Within one user: pinned before unpinned, then by explicit
            // index, -1 sorted last. The sort is stable, preserving arrival
            // order among equals.
            entries.sort_by_key(assign_key);
            batch.extend(entries);
        }
        batch.extend(properties);
        batch.extend(adds);

        if !batch.is_empty() {
            batch.insert(0, FactChange::ChangeSet(next_change_set()));
            debug!(event = "change_batch", size = batch.len());
        }
        Ok(batch)
    }

    /// A record the solver does not know yet.
    fn diff_unknown(
        &self,
        record: &TaskRecord,
        status: TaskStatus,
        adds: &mut Vec<FactChange>,
        assigns: &mut BTreeMap<UserId, Vec<FactChange>>,
    ) {
        match status {
            TaskStatus::Ready => adds.push(FactChange::Add {
                task: to_task(record, status),
            }),
            s if s.is_assignable() => {
                if let Some(owner) = record.owner() {
                    // Already externally visible under this owner: respect
                    // it, pinned and published.
                    let user = self.resolve_user(owner);
                    let index = record
                        .planning
                        .as_ref()
                        .filter(|p| p.assigned_user == owner)
                        .map_or(-1, |p| p.index);
                    assigns.entry(user.id.clone()).or_default().push(FactChange::Assign {
                        task: to_task(record, status),
                        user,
                        index,
                        pinned: true,
                        published: true,
                    });
                }
                // Ownerless and unknown: nothing to do until it surfaces
                // again as Ready/Reserved.
            }
            _ => {
                // Terminal and unknown to the model: already gone.
            }
        }
    }

    /// A record the solver already holds; compare statuses and owners.
    #[allow(clippy::too_many_arguments)]
    fn diff_known(
        &self,
        record: &TaskRecord,
        status: TaskStatus,
        task: &Task,
        removes: &mut Vec<FactChange>,
        releases: &mut Vec<FactChange>,
        assigns: &mut BTreeMap<UserId, Vec<FactChange>>,
        properties: &mut Vec<FactChange>,
    ) {
        let mut removed = false;
        if status == TaskStatus::Ready {
            if task.status != TaskStatus::Ready {
                // Released out of band.
                releases.push(FactChange::Release { task_id: task.id });
            }
        } else if status.is_assignable() {
            match record.owner() {
                None => {
                    // Regressed to an ownerless suspended state; it will
                    // re-enter through the unknown path later.
                    removes.push(FactChange::Remove { task_id: task.id });
                    removed = true;
                }
                Some(owner) => {
                    let recorded = self.assignment.owner_of(task.id).map(UserId::as_str);
                    if recorded != Some(owner) {
                        // Manual reassignment must be respected.
                        let user = self.resolve_user(owner);
                        assigns.entry(user.id.clone()).or_default().push(FactChange::Assign {
                            task: to_task(record, status),
                            user,
                            index: -1,
                            pinned: true,
                            published: true,
                        });
                    } else if !task.pinned
                        && record.planning.as_ref().is_some_and(|p| p.published)
                    {
                        // Lock in a decision that has already been shown to
                        // a human.
                        let user = self.resolve_user(owner);
                        assigns.entry(user.id.clone()).or_default().push(FactChange::Assign {
                            task: to_task(record, status),
                            user,
                            index: task.index,
                            pinned: true,
                            published: true,
                        });
                    }
                }
            }
        } else {
            removes.push(FactChange::Remove { task_id: task.id });
            removed = true;
        }

        if !removed {
            let priority = (record.priority != task.priority).then_some(record.priority);
            let new_status = (status != task.status).then_some(status);
            if priority.is_some() || new_status.is_some() {
                properties.push(FactChange::PropertyChange {
                    task_id: task.id,
                    priority,
                    status: new_status,
                });
            }
        }
    }

    /// Resolves a user by id: the assignment first, then the directory,
    /// then the ad-hoc convention. Directory failures are logged and fall
    /// through; diffing itself never fails on I/O.
    fn resolve_user(&self, id: &str) -> User {
        if let Some(user) = self.assignment.user(id) {
            return User::new(user.id.clone(), user.enabled);
        }
        match self.directory.find_user(id) {
            Ok(Some(record)) => User::new(record.id, record.active),
            Ok(None) => {
                debug!(event = "diff_adhoc_user", user = id);
                User::external(id)
            }
            Err(err) => {
                warn!(event = "user_lookup_failed", user = id, error = %err);
                User::external(id)
            }
        }
    }
}

fn assign_key(change: &FactChange) -> (bool, i64) {
    match change {
        FactChange::Assign { pinned, index, .. } => {
            (!pinned, if *index < 0 { i64::MAX } else { i64::from(*index) })
        }
        _ => (true, i64::MAX),
    }
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
#[path = "diff_tests.rs"]
mod tests;
