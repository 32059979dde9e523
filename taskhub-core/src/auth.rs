//! Resolves a caller's relationship to a task and its project.

use crate::principal::{Principal, Project};
use crate::task::Task;

/// How a principal relates to a task within its project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The principal owns the project.
    Owner,
    /// The principal is the task's current assignee.
    Assignee,
    /// No privileged relationship.
    None,
}

/// Resolves the caller's relation to `(task, project)`.
///
/// Ownership is decided by user id. Assignee-ship is decided by email match
/// against the task's assignee: assignees may be added to a roster before
/// they have a matching account, so email is the binding key. Pure predicate
/// logic; missing entities are rejected by the caller before reaching here.
#[must_use]
pub fn resolve(principal: &Principal, task: &Task, project: &Project) -> Relation {
    if project.owner_id == principal.id {
        return Relation::Owner;
    }
    match &task.assignee {
        Some(assignee) if assignee.email == principal.email => Relation::Assignee,
        _ => Relation::None,
    }
}
