//! Messaging/delivery engine: live push for online receivers, persistence
//! for offline ones.
//!
//! For a single send, exactly one of the two paths happens. A message
//! pushed to a live connection is tagged with a server-assigned timestamp
//! and never persisted; a message for an offline receiver becomes an unread
//! [`ChatMessage`] row. If the push hits a dead channel, the stale presence
//! entry is evicted and the send falls back to persistence, so a message is
//! never lost to a half-closed socket.

use std::sync::Arc;

use taskhub_core::chat::{ChatMessage, UnreadCount};
use taskhub_core::ids::UserId;
use taskhub_core::protocol::ServerEvent;
use taskhub_core::time::Timestamp;

use crate::presence::PresenceRegistry;
use crate::store::ChatStore;

/// Error returned by the messaging engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// The message text is empty.
    #[error("message text is empty")]
    EmptyText,

    /// The receiver id is missing from the request.
    #[error("receiver id is missing")]
    MissingReceiver,
}

/// Result of a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// True if the message was pushed to a live connection; false if it was
    /// persisted for later retrieval.
    pub delivered: bool,
}

/// The delivery engine over the chat store and an injected presence
/// registry.
pub struct ChatService {
    store: Arc<ChatStore>,
    presence: Arc<PresenceRegistry>,
}

impl ChatService {
    /// Creates the service over the given store and presence registry.
    #[must_use]
    pub const fn new(store: Arc<ChatStore>, presence: Arc<PresenceRegistry>) -> Self {
        Self { store, presence }
    }

    /// The injected presence registry.
    #[must_use]
    pub const fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    /// Sends a direct message from `sender_id` to `receiver_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyText`] for an empty message; a missing
    /// receiver is rejected by the caller as [`ChatError::MissingReceiver`]
    /// before ids are resolved.
    pub async fn send(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        text: String,
    ) -> Result<Delivery, ChatError> {
        if text.is_empty() {
            return Err(ChatError::EmptyText);
        }

        if let Some(connection) = self.presence.lookup(&receiver_id).await {
            let event = ServerEvent::Message {
                sender_id: sender_id.clone(),
                text: text.clone(),
                timestamp: Timestamp::now(),
            };
            if connection.tx.send(event).is_ok() {
                tracing::debug!(from = %sender_id, to = %receiver_id, "message delivered live");
                return Ok(Delivery { delivered: true });
            }
            // Dead channel: the socket went away without disconnect
            // cleanup. Evict and fall through to the offline path.
            tracing::warn!(to = %receiver_id, "live push failed, evicting stale connection");
            self.presence.remove_user(&receiver_id).await;
        }

        let message = ChatMessage::new(sender_id.clone(), receiver_id.clone(), text);
        self.store.insert(message).await;
        tracing::debug!(from = %sender_id, to = %receiver_id, "receiver offline, message persisted");
        Ok(Delivery { delivered: false })
    }

    /// Returns the persisted conversation between two users, send-time
    /// ascending. Pure read.
    pub async fn history(&self, user: &UserId, peer: &UserId) -> Vec<ChatMessage> {
        self.store.history(user, peer).await
    }

    /// Marks all unread messages from `sender` to `receiver` as read,
    /// returning the number of rows updated. Idempotent.
    pub async fn mark_read(&self, receiver: &UserId, sender: &UserId) -> u64 {
        let updated = self.store.mark_read(receiver, sender).await;
        if updated > 0 {
            tracing::debug!(receiver = %receiver, sender = %sender, updated, "messages marked read");
        }
        updated
    }

    /// Returns unread totals for `receiver`, grouped by sender.
    pub async fn unread_counts(&self, receiver: &UserId) -> Vec<UnreadCount> {
        self.store.unread_counts(receiver).await
    }
}
