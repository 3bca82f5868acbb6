//! The assignment model: the full mapping of tasks to users.
//!
//! Tasks live in an arena keyed by id; each user owns an ordered queue of
//! task ids and a single `owner_of` map enforces the exactly-one-owner
//! invariant. Chain-derived fields (position index, start/end offsets) are
//! recomputed whenever a queue changes.

use std::collections::BTreeMap;

use crate::error::{ModelError, Result};
use crate::task::{Task, TaskId};
use crate::user::{User, UserId};

/// One candidate solution: every user, every task, and the ownership map.
///
/// The planning user is always present. Unassigned tasks sit in a separate
/// pool; assigned tasks appear in exactly one user's queue.
#[derive(Debug, Clone)]
pub struct TaskAssignment {
    tasks: BTreeMap<TaskId, Task>,
    users: BTreeMap<UserId, User>,
    owner_of: BTreeMap<TaskId, UserId>,
    unassigned: Vec<TaskId>,
    change_set: u64,
}

impl TaskAssignment {
    /// Creates an empty assignment holding only the planning user.
    pub fn new() -> Self {
        let mut users = BTreeMap::new();
        let planning = User::planning();
        users.insert(planning.id.clone(), planning);
        Self {
            tasks: BTreeMap::new(),
            users,
            owner_of: BTreeMap::new(),
            unassigned: Vec::new(),
            change_set: 0,
        }
    }

    /// The change-set id stamped by the most recently applied marker.
    pub fn change_set(&self) -> u64 {
        self.change_set
    }

    pub(crate) fn set_change_set(&mut self, id: u64) {
        self.change_set = id;
    }

    /// Adds a user if absent; an existing user (and its queue) is kept.
    pub fn add_user(&mut self, user: User) {
        self.users.entry(user.id.clone()).or_insert(user);
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    /// All users, planning user included, in id order.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// All tasks, sentinels included, in id order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// The owning user of an assigned task.
    pub fn owner_of(&self, task_id: TaskId) -> Option<&UserId> {
        self.owner_of.get(&task_id)
    }

    /// Unassigned pool, in insertion order.
    pub fn unassigned(&self) -> &[TaskId] {
        &self.unassigned
    }

    pub fn non_sentinel_task_count(&self) -> usize {
        self.tasks.values().filter(|t| !t.is_sentinel()).count()
    }

    /// Inserts a task into the arena and the unassigned pool.
    ///
    /// Returns false (and leaves the model untouched) when the id is
    /// already present.
    pub fn add_task(&mut self, task: Task) -> bool {
        if self.tasks.contains_key(&task.id) {
            return false;
        }
        self.unassigned.push(task.id);
        self.tasks.insert(task.id, task);
        true
    }

    /// Attaches a task to a user's queue at `index` (−1 appends), detaching
    /// it from wherever it currently sits. Creates the user by convention
    /// when it is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownTask`] when the task is not in the arena.
    pub fn assign(
        &mut self,
        task_id: TaskId,
        user_id: &str,
        index: i32,
        pinned: bool,
        published: bool,
    ) -> Result<()> {
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or(ModelError::UnknownTask { task_id })?;
        task.pinned = pinned;
        task.published = published;

        let previous = self.detach(task_id);
        let owner = self
            .users
            .entry(user_id.to_owned())
            .or_insert_with(|| User::external(user_id));
        let at = if index < 0 {
            owner.queue.len()
        } else {
            (index as usize).min(owner.queue.len())
        };
        owner.queue.insert(at, task_id);
        self.owner_of.insert(task_id, user_id.to_owned());

        if let Some(prev) = previous.filter(|p| p != user_id) {
            self.rebuild_chain(&prev);
        }
        self.rebuild_chain(user_id);
        Ok(())
    }

    /// Detaches a task back to the unassigned pool as Ready, clearing the
    /// pinned and published flags.
    pub fn release(&mut self, task_id: TaskId) -> Result<()> {
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or(ModelError::UnknownTask { task_id })?;
        task.status = crate::status::TaskStatus::Ready;
        task.pinned = false;
        task.published = false;
        task.index = -1;
        task.start_millis = 0;
        task.end_millis = 0;

        let previous = self.detach(task_id);
        self.unassigned.push(task_id);
        if let Some(prev) = previous {
            self.rebuild_chain(&prev);
        }
        Ok(())
    }

    /// Deletes a task from the model entirely.
    pub fn remove(&mut self, task_id: TaskId) -> Result<Task> {
        let task = self
            .tasks
            .remove(&task_id)
            .ok_or(ModelError::UnknownTask { task_id })?;
        let previous = self.detach(task_id);
        if let Some(prev) = previous {
            self.rebuild_chain(&prev);
        }
        Ok(task)
    }

    /// Removes the task from its current queue or the unassigned pool.
    /// Returns the previous owner, if any.
    fn detach(&mut self, task_id: TaskId) -> Option<UserId> {
        match self.owner_of.remove(&task_id) {
            Some(owner_id) => {
                if let Some(user) = self.users.get_mut(&owner_id) {
                    user.queue.retain(|id| *id != task_id);
                }
                Some(owner_id)
            }
            None => {
                self.unassigned.retain(|id| *id != task_id);
                None
            }
        }
    }

    /// Recomputes the derived chain fields of a user's queue: position
    /// index, and start/end offsets where each task starts when its
    /// predecessor ends.
    pub fn rebuild_chain(&mut self, user_id: &str) {
        let ids: Vec<TaskId> = match self.users.get(user_id) {
            Some(user) => user.queue.clone(),
            None => return,
        };
        let mut cursor = 0i64;
        for (position, id) in ids.iter().enumerate() {
            if let Some(task) = self.tasks.get_mut(id) {
                task.index = position as i32;
                task.start_millis = cursor;
                task.end_millis = cursor + task.duration_millis;
                cursor = task.end_millis;
            }
        }
    }

    /// The tasks of a user's queue, in chain order.
    pub fn queue_tasks(&self, user_id: &str) -> impl Iterator<Item = &Task> {
        self.users
            .get(user_id)
            .map(|u| u.queue.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |id| self.tasks.get(id))
    }

    /// Verifies the structural invariants; intended for tests.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if !self.users.contains_key(crate::user::PLANNING_USER_ID) {
            return Err("planning user missing".to_string());
        }
        for (task_id, owner_id) in &self.owner_of {
            let user = self
                .users
                .get(owner_id)
                .ok_or_else(|| format!("owner {owner_id} of task {task_id} unknown"))?;
            let occurrences = user.queue.iter().filter(|id| *id == task_id).count();
            if occurrences != 1 {
                return Err(format!(
                    "task {task_id} appears {occurrences} times in queue of {owner_id}"
                ));
            }
            if self.unassigned.contains(task_id) {
                return Err(format!("task {task_id} both owned and unassigned"));
            }
        }
        for user in self.users.values() {
            for (position, task_id) in user.queue.iter().enumerate() {
                if self.owner_of.get(task_id) != Some(&user.id) {
                    return Err(format!("task {task_id} in queue of {} without ownership", user.id));
                }
                let task = self
                    .tasks
                    .get(task_id)
                    .ok_or_else(|| format!("queued task {task_id} not in arena"))?;
                if task.index != position as i32 {
                    return Err(format!(
                        "task {task_id} index {} disagrees with position {position}",
                        task.index
                    ));
                }
            }
        }
        for task_id in &self.unassigned {
            if !self.tasks.contains_key(task_id) {
                return Err(format!("unassigned task {task_id} not in arena"));
            }
        }
        for task_id in self.tasks.keys() {
            let owned = self.owner_of.contains_key(task_id);
            let pooled = self.unassigned.contains(task_id);
            if owned == pooled {
                return Err(format!("task {task_id} must be exactly one of owned/unassigned"));
            }
        }
        Ok(())
    }
}

impl Default for TaskAssignment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "assignment_tests.rs"]
mod tests;
