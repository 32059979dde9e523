//! Authenticated principals and the projects they own.
//!
//! Credential handling (signup, login, password reset) lives in an upstream
//! authentication layer; this crate only consumes the resulting identity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{ProjectId, UserId};

/// An authenticated user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable user identifier from the auth layer.
    pub id: UserId,
    /// Unique email address.
    pub email: String,
    /// Display name.
    pub name: String,
}

/// A project owning a set of tasks.
///
/// The owner is the creating principal and is immutable after creation.
/// Authorization decisions only consume `{id, owner_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier.
    pub id: ProjectId,
    /// The principal that created the project.
    pub owner_id: UserId,
    /// Project name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Planned start date.
    pub start_date: NaiveDate,
    /// Planned end date.
    pub end_date: NaiveDate,
}
