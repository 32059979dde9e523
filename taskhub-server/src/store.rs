//! In-memory document stores for projects, tasks, and chat messages.
//!
//! Each operation is a point operation against one store and is atomic
//! under the store's [`RwLock`]; there are no cross-store transactions.
//! Task status changes go through [`TaskStore::update_if_status`], a
//! conditional write ("update WHERE id = X AND status = expected") so a
//! racing second writer fails with the actual status instead of silently
//! overwriting.

use std::collections::HashMap;

use tokio::sync::RwLock;

use taskhub_core::chat::{ChatMessage, UnreadCount};
use taskhub_core::ids::{MessageId, ProjectId, TaskId, UserId};
use taskhub_core::principal::Project;
use taskhub_core::task::{Task, TaskStatus};

/// Outcome of a failed conditional task update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionalUpdateError {
    /// No task with the given id exists.
    #[error("task not found")]
    NotFound,

    /// The task's status no longer matches the expected value.
    #[error("task status is {actual}, expected {expected}")]
    StatusMismatch {
        /// Status the caller observed before the write.
        expected: TaskStatus,
        /// Status actually stored at write time.
        actual: TaskStatus,
    },
}

/// Project records, keyed by id.
#[derive(Debug, Default)]
pub struct ProjectStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
}

impl ProjectStore {
    /// Creates an empty project store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a project record.
    pub async fn insert(&self, project: Project) {
        let mut projects = self.projects.write().await;
        projects.insert(project.id, project);
    }

    /// Returns a copy of the project with the given id, if present.
    pub async fn get(&self, id: ProjectId) -> Option<Project> {
        let projects = self.projects.read().await;
        projects.get(&id).cloned()
    }
}

/// Task records, keyed by id.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl TaskStore {
    /// Creates an empty task store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a task record.
    pub async fn insert(&self, task: Task) {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task);
    }

    /// Returns a copy of the task with the given id, if present.
    pub async fn get(&self, id: TaskId) -> Option<Task> {
        let tasks = self.tasks.read().await;
        tasks.get(&id).cloned()
    }

    /// Removes a task, returning it if it existed.
    pub async fn remove(&self, id: TaskId) -> Option<Task> {
        let mut tasks = self.tasks.write().await;
        tasks.remove(&id)
    }

    /// Applies `apply` to the task only if its stored status still matches
    /// `expected`, returning the updated record.
    ///
    /// This is the lost-update guard for the workflow engine: validation
    /// happens against a snapshot, and the write re-checks the status under
    /// the write lock.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionalUpdateError::NotFound`] if the task is gone, or
    /// [`ConditionalUpdateError::StatusMismatch`] if a racing transition got
    /// there first.
    pub async fn update_if_status(
        &self,
        id: TaskId,
        expected: TaskStatus,
        apply: impl FnOnce(&mut Task),
    ) -> Result<Task, ConditionalUpdateError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(ConditionalUpdateError::NotFound)?;
        if task.status != expected {
            return Err(ConditionalUpdateError::StatusMismatch {
                expected,
                actual: task.status,
            });
        }
        apply(task);
        Ok(task.clone())
    }

    /// Returns all tasks belonging to a project.
    pub async fn list_by_project(&self, project_id: ProjectId) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut found: Vec<Task> = tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        found
    }

    /// Returns all tasks assigned to the given email address.
    pub async fn list_by_assignee_email(&self, email: &str) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut found: Vec<Task> = tasks
            .values()
            .filter(|t| t.assignee.as_ref().is_some_and(|a| a.email == email))
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        found
    }
}

/// Persisted chat messages with the unread-count and mark-read queries.
#[derive(Debug, Default)]
pub struct ChatStore {
    messages: RwLock<HashMap<MessageId, ChatMessage>>,
}

impl ChatStore {
    /// Creates an empty chat store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists a message.
    pub async fn insert(&self, message: ChatMessage) {
        let mut messages = self.messages.write().await;
        messages.insert(message.id, message);
    }

    /// Returns all messages between two users in either direction, sorted
    /// by send time ascending.
    ///
    /// The sort is explicit: insertion order is not trusted for read-back.
    pub async fn history(&self, a: &UserId, b: &UserId) -> Vec<ChatMessage> {
        let messages = self.messages.read().await;
        let mut found: Vec<ChatMessage> = messages
            .values()
            .filter(|m| {
                (m.sender_id == *a && m.receiver_id == *b)
                    || (m.sender_id == *b && m.receiver_id == *a)
            })
            .cloned()
            .collect();
        found.sort_by_key(|m| (m.sent_at, m.id.as_uuid().as_u128()));
        found
    }

    /// Flips `is_read` on every unread message from `sender` to `receiver`,
    /// returning how many rows changed.
    ///
    /// Idempotent: a second call finds nothing unread and returns 0.
    pub async fn mark_read(&self, receiver: &UserId, sender: &UserId) -> u64 {
        let mut messages = self.messages.write().await;
        let mut updated = 0;
        for message in messages.values_mut() {
            if message.receiver_id == *receiver && message.sender_id == *sender && !message.is_read
            {
                message.is_read = true;
                updated += 1;
            }
        }
        updated
    }

    /// Returns unread totals for `receiver`, grouped by sender and sorted
    /// by sender id for deterministic output.
    pub async fn unread_counts(&self, receiver: &UserId) -> Vec<UnreadCount> {
        let messages = self.messages.read().await;
        let mut by_sender: HashMap<&UserId, u64> = HashMap::new();
        for message in messages.values() {
            if message.receiver_id == *receiver && !message.is_read {
                *by_sender.entry(&message.sender_id).or_default() += 1;
            }
        }
        let mut counts: Vec<UnreadCount> = by_sender
            .into_iter()
            .map(|(sender_id, count)| UnreadCount {
                sender_id: sender_id.clone(),
                count,
            })
            .collect();
        counts.sort_by(|x, y| x.sender_id.cmp(&y.sender_id));
        counts
    }
}
