//! JSON socket protocol between clients and the chat server.
//!
//! Events travel as JSON text frames over the WebSocket. The client opens a
//! session with `register`; the server answers `registered` followed by the
//! caller's current unread counts. Every `send_message` is acknowledged with
//! `sent`, whose `delivered` flag distinguishes live delivery from offline
//! persistence.

use serde::{Deserialize, Serialize};

use crate::chat::UnreadCount;
use crate::ids::UserId;
use crate::time::Timestamp;

/// Events sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Binds this connection to a principal. Must be the first event.
    Register {
        /// The principal opening the session.
        user_id: UserId,
    },
    /// Sends a direct message.
    ///
    /// `receiver_id` is optional on the wire so a missing field can be
    /// rejected loudly with an `error` event instead of a decode failure.
    SendMessage {
        /// Sending principal.
        sender_id: UserId,
        /// Receiving principal; rejected if absent.
        receiver_id: Option<UserId>,
        /// Message text.
        text: String,
    },
    /// Marks all unread messages from `sender_id` to `user_id` as read.
    MarkRead {
        /// The reading principal (receiver of the messages).
        user_id: UserId,
        /// The sender whose messages are being read.
        sender_id: UserId,
    },
}

/// Events sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Acknowledges a successful `register`.
    Registered {
        /// The principal the connection is now bound to.
        user_id: UserId,
    },
    /// A message delivered live to this connection.
    Message {
        /// Sending principal.
        sender_id: UserId,
        /// Message text.
        text: String,
        /// Server-assigned send time.
        timestamp: Timestamp,
    },
    /// Acknowledges a `send_message`.
    Sent {
        /// True if pushed to a live connection, false if persisted for
        /// later retrieval.
        delivered: bool,
    },
    /// Current unread counts for the session's principal, pushed after
    /// registration and after every `mark_read`.
    UnreadCounts {
        /// Unread totals grouped by sender.
        counts: Vec<UnreadCount>,
    },
    /// A request was rejected; the reason distinguishes structural problems
    /// from authorization ones.
    Error {
        /// Human-readable rejection reason.
        reason: String,
    },
}

/// Error returned when a frame cannot be encoded or decoded.
#[derive(Debug, thiserror::Error)]
#[error("protocol error: {0}")]
pub struct ProtocolError(#[from] serde_json::Error);

/// Encodes a client event as a JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] if serialization fails.
pub fn encode_client(event: &ClientEvent) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}

/// Decodes a client event from a JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the frame is not a valid event.
pub fn decode_client(frame: &str) -> Result<ClientEvent, ProtocolError> {
    Ok(serde_json::from_str(frame)?)
}

/// Encodes a server event as a JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] if serialization fails.
pub fn encode_server(event: &ServerEvent) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}

/// Decodes a server event from a JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the frame is not a valid event.
pub fn decode_server(frame: &str) -> Result<ServerEvent, ProtocolError> {
    Ok(serde_json::from_str(frame)?)
}
