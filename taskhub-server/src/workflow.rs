//! Workflow engine: task creation, status transitions, and deletion.
//!
//! Every mutation validates first and writes second; a rejected request
//! leaves no partial state. The status write itself is a conditional update
//! keyed on the status observed during validation, so two racing
//! transitions cannot silently overwrite each other: the loser gets
//! [`WorkflowError::Conflict`] instead.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tokio::sync::mpsc;

use taskhub_core::auth;
use taskhub_core::ids::{ProjectId, TaskId};
use taskhub_core::principal::Principal;
use taskhub_core::task::{Assignee, Comment, Task, TaskStatus};
use taskhub_core::time::Timestamp;
use taskhub_core::workflow::{self, TransitionError};

use crate::notify::AssignmentNotice;
use crate::store::{ConditionalUpdateError, ProjectStore, TaskStore};

/// Comment injected when the owner pulls a task back from review without
/// saying why.
const DEFAULT_REWORK_COMMENT: &str = "moved back to in-progress";

/// Error returned by workflow operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// A referenced entity does not exist.
    #[error("{what} not found")]
    NotFound {
        /// What was looked up ("task" or "project").
        what: &'static str,
    },

    /// The requested transition was rejected, structurally or for lack of
    /// the required role.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// An operation reserved for the project owner.
    #[error("only the project owner may {action}")]
    OwnerRequired {
        /// The attempted operation.
        action: &'static str,
    },

    /// The transition would leave a non-pending task without an assignee.
    #[error("a task cannot enter {status} without an assignee")]
    MissingAssignee {
        /// The status that requires an assignee.
        status: TaskStatus,
    },

    /// A racing transition changed the task between validation and write.
    #[error("task was modified concurrently (status is now {actual})")]
    Conflict {
        /// The status found at write time.
        actual: TaskStatus,
    },
}

/// Payload for creating a task.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    /// Project the task belongs to.
    pub project_id: ProjectId,
    /// Task name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Planned start date.
    pub start_date: NaiveDate,
    /// Planned end date.
    pub end_date: NaiveDate,
    /// Optional initial comment.
    pub comment: Option<String>,
}

/// Optional side-effect payload accompanying a transition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionRequest {
    /// Comment to append with the caller as author.
    pub comment: Option<String>,
    /// Assignee to set or replace (typically when assigning from pending).
    pub assignee: Option<Assignee>,
    /// Blob-store path of an uploaded file to attach.
    pub file: Option<String>,
}

/// The workflow engine over the task and project stores.
///
/// Assignment changes are reported to the notification queue; only channel
/// acceptance is awaited, never delivery.
pub struct WorkflowService {
    tasks: Arc<TaskStore>,
    projects: Arc<ProjectStore>,
    notices: mpsc::UnboundedSender<AssignmentNotice>,
}

impl WorkflowService {
    /// Creates the service over the given stores and notification queue.
    #[must_use]
    pub const fn new(
        tasks: Arc<TaskStore>,
        projects: Arc<ProjectStore>,
        notices: mpsc::UnboundedSender<AssignmentNotice>,
    ) -> Self {
        Self {
            tasks,
            projects,
            notices,
        }
    }

    /// Creates a task in `pending` with no assignee.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] if the project does not exist and
    /// [`WorkflowError::OwnerRequired`] if the caller does not own it.
    pub async fn create_task(
        &self,
        principal: &Principal,
        new: NewTask,
    ) -> Result<Task, WorkflowError> {
        let project = self
            .projects
            .get(new.project_id)
            .await
            .ok_or(WorkflowError::NotFound { what: "project" })?;
        if project.owner_id != principal.id {
            return Err(WorkflowError::OwnerRequired {
                action: "create a task",
            });
        }

        let now = Timestamp::now();
        let comments = new
            .comment
            .map(|text| Comment {
                author: principal.id.clone(),
                text,
                at: now,
            })
            .into_iter()
            .collect();
        let task = Task {
            id: TaskId::new(),
            project_id: new.project_id,
            name: new.name,
            description: new.description,
            start_date: new.start_date,
            end_date: new.end_date,
            status: TaskStatus::Pending,
            assignee: None,
            comments,
            files: vec![],
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(task.clone()).await;
        tracing::info!(task_id = %task.id, project_id = %task.project_id, "task created");
        Ok(task)
    }

    /// Moves a task to `new_status`, applying the side effects in `request`
    /// atomically with the status change.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] for a missing task or project,
    /// [`WorkflowError::Transition`] for an illegal edge or missing role,
    /// [`WorkflowError::MissingAssignee`] if the target status requires one,
    /// and [`WorkflowError::Conflict`] if a racing transition won.
    pub async fn transition(
        &self,
        task_id: TaskId,
        principal: &Principal,
        new_status: TaskStatus,
        request: TransitionRequest,
    ) -> Result<Task, WorkflowError> {
        let task = self
            .tasks
            .get(task_id)
            .await
            .ok_or(WorkflowError::NotFound { what: "task" })?;
        let project = self
            .projects
            .get(task.project_id)
            .await
            .ok_or(WorkflowError::NotFound { what: "project" })?;

        let relation = auth::resolve(principal, &task, &project);
        let observed = task.status;
        workflow::authorize(observed, new_status, relation)?;

        // Tasks only reach in-progress/review/completed with an assignee
        // on record; the assignment may arrive with this very transition.
        let assignee_after = request.assignee.as_ref().or(task.assignee.as_ref());
        if new_status != TaskStatus::Pending && assignee_after.is_none() {
            return Err(WorkflowError::MissingAssignee { status: new_status });
        }

        let assignee_changed =
            request.assignee.is_some() && request.assignee != task.assignee;
        let comment_text = request.comment.or_else(|| {
            (observed == TaskStatus::Review && new_status == TaskStatus::InProgress)
                .then(|| DEFAULT_REWORK_COMMENT.to_string())
        });

        let author = principal.id.clone();
        let new_assignee = request.assignee;
        let file = request.file;
        let updated = self
            .tasks
            .update_if_status(task_id, observed, move |t| {
                let now = Timestamp::now();
                t.status = new_status;
                if let Some(text) = comment_text {
                    t.comments.push(Comment {
                        author,
                        text,
                        at: now,
                    });
                }
                if let Some(assignee) = new_assignee {
                    t.assignee = Some(assignee);
                }
                if let Some(path) = file {
                    t.files.push(path);
                }
                t.updated_at = now;
            })
            .await
            .map_err(|e| match e {
                ConditionalUpdateError::NotFound => WorkflowError::NotFound { what: "task" },
                ConditionalUpdateError::StatusMismatch { actual, .. } => {
                    WorkflowError::Conflict { actual }
                }
            })?;

        tracing::info!(
            task_id = %task_id,
            from = %observed,
            to = %new_status,
            by = %principal.id,
            "task transitioned"
        );

        if assignee_changed
            && let Some(assignee) = &updated.assignee
        {
            // Fire-and-forget: the queue accepts immediately and the worker
            // owns delivery. A closed queue only loses the notification.
            let notice = AssignmentNotice::for_task(&updated, assignee.email.clone());
            if self.notices.send(notice).is_err() {
                tracing::warn!(task_id = %task_id, "notification queue closed, notice dropped");
            }
        }

        Ok(updated)
    }

    /// Deletes a task. Owner only, regardless of status.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] for a missing task or project and
    /// [`WorkflowError::OwnerRequired`] for any caller but the owner.
    pub async fn delete_task(
        &self,
        task_id: TaskId,
        principal: &Principal,
    ) -> Result<(), WorkflowError> {
        let task = self
            .tasks
            .get(task_id)
            .await
            .ok_or(WorkflowError::NotFound { what: "task" })?;
        let project = self
            .projects
            .get(task.project_id)
            .await
            .ok_or(WorkflowError::NotFound { what: "project" })?;
        if project.owner_id != principal.id {
            return Err(WorkflowError::OwnerRequired {
                action: "delete a task",
            });
        }
        self.tasks
            .remove(task_id)
            .await
            .ok_or(WorkflowError::NotFound { what: "task" })?;
        tracing::info!(task_id = %task_id, by = %principal.id, "task deleted");
        Ok(())
    }

    /// Lists tasks in a project, oldest first.
    pub async fn list_by_project(&self, project_id: ProjectId) -> Vec<Task> {
        self.tasks.list_by_project(project_id).await
    }

    /// Lists tasks assigned to an email address, oldest first.
    pub async fn list_by_assignee_email(&self, email: &str) -> Vec<Task> {
        self.tasks.list_by_assignee_email(email).await
    }
}
