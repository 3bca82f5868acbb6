//! Planning items: the externally published view of one task's assignment.

use crate::task::TaskId;
use crate::user::UserId;

/// One row of a published plan.
///
/// Built transiently each publish cycle from the current best solution and
/// handed to the external solution processor; never persisted internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningItem {
    pub container_id: String,
    pub task_id: TaskId,
    pub process_instance_id: i64,
    pub assigned_user: UserId,
    pub index: i32,
    pub published: bool,
}
