//! `TaskHub` collaboration server library.
//!
//! Exposes the workflow engine, chat delivery engine, presence registry,
//! stores, and the HTTP/WebSocket surface for use in tests and embedding.

pub mod chat;
pub mod config;
pub mod http;
pub mod notify;
pub mod presence;
pub mod socket;
pub mod store;
pub mod workflow;
