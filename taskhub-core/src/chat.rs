//! Direct-message entities shared by the delivery engine and its callers.

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, UserId};
use crate::time::Timestamp;

/// A persisted direct message between two principals.
///
/// Rows are created only when the receiver is offline at send time; a
/// message pushed to a live connection is never persisted. `is_read` starts
/// false and is flipped once by the bulk mark-read operation, never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier.
    pub id: MessageId,
    /// Sending principal.
    pub sender_id: UserId,
    /// Receiving principal.
    pub receiver_id: UserId,
    /// Message text.
    pub text: String,
    /// Server-assigned send time.
    pub sent_at: Timestamp,
    /// Whether the receiver has opened the conversation since this arrived.
    pub is_read: bool,
}

impl ChatMessage {
    /// Creates a new unread message with a fresh id and the current time.
    #[must_use]
    pub fn new(sender_id: UserId, receiver_id: UserId, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            sender_id,
            receiver_id,
            text: text.into(),
            sent_at: Timestamp::now(),
            is_read: false,
        }
    }
}

/// Number of unread messages from one sender, used to paint badges and to
/// pick the conversation to auto-open on client load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    /// The sender the unread messages are from.
    pub sender_id: UserId,
    /// How many of their messages are unread.
    pub count: u64,
}
