//! The task status state machine.
//!
//! Legal transitions and the role required to trigger each one are a single
//! data table ([`transition_rule`]); adding or auditing an edge is a data
//! change, not a control-flow change. `completed` is absorbing: the only way
//! out is owner-initiated deletion, which is a separate operation.
//!
//! Rejections are split into two distinct errors so a client can tell "this
//! task cannot go there" from "you cannot do that":
//! [`TransitionError::Invalid`] (structural) and
//! [`TransitionError::Unauthorized`] (names the required role).

use crate::auth::Relation;
use crate::task::TaskStatus;

/// The role a caller must hold to trigger a given transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    /// Project owner or current assignee.
    OwnerOrAssignee,
    /// Current assignee only.
    AssigneeOnly,
    /// Project owner only.
    OwnerOnly,
}

impl RequiredRole {
    /// Returns whether the caller's relation satisfies this requirement.
    #[must_use]
    pub const fn permits(self, relation: Relation) -> bool {
        match self {
            Self::OwnerOrAssignee => {
                matches!(relation, Relation::Owner | Relation::Assignee)
            }
            Self::AssigneeOnly => matches!(relation, Relation::Assignee),
            Self::OwnerOnly => matches!(relation, Relation::Owner),
        }
    }
}

impl std::fmt::Display for RequiredRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OwnerOrAssignee => write!(f, "owner or assignee"),
            Self::AssigneeOnly => write!(f, "assignee"),
            Self::OwnerOnly => write!(f, "owner"),
        }
    }
}

/// The transition table: `(from, to) -> required role`.
///
/// Returns `None` for any pair not in the table, including every edge out
/// of `Completed` and all self-transitions.
#[must_use]
pub const fn transition_rule(from: TaskStatus, to: TaskStatus) -> Option<RequiredRole> {
    use TaskStatus::{Completed, InProgress, Pending, Review};
    match (from, to) {
        (Pending, InProgress | Review) => Some(RequiredRole::OwnerOrAssignee),
        (InProgress, Review | Pending) => Some(RequiredRole::AssigneeOnly),
        (Review, InProgress | Completed) => Some(RequiredRole::OwnerOnly),
        _ => None,
    }
}

/// Error returned when a requested transition is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The edge does not exist in the transition table.
    #[error("task cannot move from {from} to {to}")]
    Invalid {
        /// Status the task is currently in.
        from: TaskStatus,
        /// Status that was requested.
        to: TaskStatus,
    },

    /// The edge exists but the caller lacks the required role.
    #[error("only the {required} may perform this transition")]
    Unauthorized {
        /// The role the caller would need.
        required: RequiredRole,
    },
}

/// Validates a requested transition against the table and the caller's
/// relation to the task.
///
/// Structural validity is checked before authorization, so an illegal edge
/// is reported as [`TransitionError::Invalid`] even for a caller with no
/// role at all.
///
/// # Errors
///
/// Returns [`TransitionError::Invalid`] for an edge not in the table, or
/// [`TransitionError::Unauthorized`] naming the required role.
pub const fn authorize(
    from: TaskStatus,
    to: TaskStatus,
    relation: Relation,
) -> Result<(), TransitionError> {
    match transition_rule(from, to) {
        None => Err(TransitionError::Invalid { from, to }),
        Some(required) => {
            if required.permits(relation) {
                Ok(())
            } else {
                Err(TransitionError::Unauthorized { required })
            }
        }
    }
}
