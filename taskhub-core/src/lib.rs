//! Shared domain model for `TaskHub`.

pub mod auth;
pub mod chat;
pub mod ids;
pub mod principal;
pub mod protocol;
pub mod task;
pub mod time;
pub mod workflow;
