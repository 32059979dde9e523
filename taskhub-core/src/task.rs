//! Task entity: lifecycle fields, assignee, comments, and attachments.
//!
//! A task belongs to exactly one project and is mutated only through the
//! workflow transitions in [`crate::workflow`]. Tasks in `in-progress`,
//! `review`, or `completed` always carry an assignee; they reach those
//! states only through an assignment-bearing transition.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{ProjectId, TaskId, UserId};
use crate::time::Timestamp;

/// Workflow status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Created, not yet picked up.
    Pending,
    /// Actively being worked on.
    InProgress,
    /// Submitted for owner review.
    Review,
    /// Accepted by the owner. Terminal except for deletion.
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Review => write!(f, "review"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0:?}")]
pub struct ParseStatusError(String);

impl std::str::FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "completed" => Ok(Self::Completed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// The team member currently responsible for a task.
///
/// Bound by email rather than account id: an assignee may be added to a
/// project roster before they have a matching user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    /// Roster entry id of the member.
    pub member_id: String,
    /// Display name.
    pub name: String,
    /// Email address, the authorization binding key.
    pub email: String,
}

/// A free-text comment attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// The principal that wrote the comment.
    pub author: UserId,
    /// Comment text.
    pub text: String,
    /// When the comment was appended.
    pub at: Timestamp,
}

/// A persisted task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Task name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Planned start date.
    pub start_date: NaiveDate,
    /// Planned end date.
    pub end_date: NaiveDate,
    /// Current workflow status.
    pub status: TaskStatus,
    /// Current assignee, if any. `None` only while `status` is `Pending`.
    pub assignee: Option<Assignee>,
    /// Comment log, oldest first.
    pub comments: Vec<Comment>,
    /// Paths of attached files in the blob store.
    pub files: Vec<String>,
    /// When the task was created.
    pub created_at: Timestamp,
    /// Refreshed on every workflow transition.
    pub updated_at: Timestamp,
}

impl Task {
    /// Returns the most recently appended comment text, if any.
    #[must_use]
    pub fn latest_comment(&self) -> Option<&str> {
        self.comments.last().map(|c| c.text.as_str())
    }
}
