//! Publish selection: the bounded prefix of each queue that is safe to
//! expose externally.
//!
//! Publishing the whole of a long queue would surface speculative future
//! assignments the solver may still revise. Each cycle therefore exposes at
//! most `window_size` leading tasks per user; the planning user is exempt
//! because parking work on it is not speculative.

use tracing::debug;

use taskforge_config::RuntimeConfig;
use taskforge_core::{PlanningItem, TaskAssignment, UserId, PLANNING_USER_ID};

/// Decides which tasks of a candidate solution become published.
#[derive(Debug, Clone)]
pub struct PublishSelector {
    window_size: usize,
    target_user: Option<UserId>,
}

impl PublishSelector {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            target_user: None,
        }
    }

    /// Restricts selection to a single user's chain.
    pub fn with_target_user(mut self, user: impl Into<UserId>) -> Self {
        self.target_user = Some(user.into());
        self
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            window_size: config.publish_window_size,
            target_user: config.target_user.clone(),
        }
    }

    /// Marks newly publishable tasks as published and returns exactly the
    /// planning items whose published flag transitioned in this call.
    ///
    /// Per user: walk the chain in order counting tasks already published;
    /// publish the next unpublished task while the count stays below the
    /// window (the planning user is unbounded). Sentinels are skipped
    /// throughout.
    pub fn select(&self, assignment: &mut TaskAssignment) -> Vec<PlanningItem> {
        let users: Vec<UserId> = assignment
            .users()
            .filter(|u| self.target_user.as_deref().map_or(true, |t| t == u.id))
            .map(|u| u.id.clone())
            .collect();

        let mut items = Vec::new();
        for user_id in users {
            let unbounded = user_id == PLANNING_USER_ID;
            let queue: Vec<_> = assignment
                .user(&user_id)
                .map(|u| u.queue().to_vec())
                .unwrap_or_default();
            let mut published = assignment
                .queue_tasks(&user_id)
                .filter(|t| !t.is_sentinel() && t.published)
                .count();

            for task_id in queue {
                if !unbounded && published >= self.window_size {
                    break;
                }
                let Some(task) = assignment.task_mut(task_id) else {
                    continue;
                };
                if task.is_sentinel() || task.published {
                    continue;
                }
                task.published = true;
                published += 1;
                items.push(PlanningItem {
                    container_id: task.container_id.clone(),
                    task_id,
                    process_instance_id: task.process_instance_id,
                    assigned_user: user_id.clone(),
                    index: task.index,
                    published: true,
                });
            }
        }

        if !items.is_empty() {
            debug!(event = "publish_selected", items = items.len());
        }
        items
    }
}
