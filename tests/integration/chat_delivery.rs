// Test-specific lint overrides: integration tests use unwrap/expect freely.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for the messaging/delivery engine.
//!
//! Exercises the presence-gated split between live push and persistence
//! across whole conversations: online and offline receivers, read-state
//! bookkeeping, and the unread aggregate that drives the client's inbox.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use taskhub_core::ids::UserId;
use taskhub_core::protocol::ServerEvent;
use taskhub_server::chat::ChatService;
use taskhub_server::presence::{Connection, PresenceRegistry};
use taskhub_server::store::ChatStore;

fn make_service() -> (ChatService, Arc<PresenceRegistry>) {
    let presence = Arc::new(PresenceRegistry::new());
    let service = ChatService::new(Arc::new(ChatStore::new()), Arc::clone(&presence));
    (service, presence)
}

fn alice() -> UserId {
    UserId::new("alice")
}

fn bob() -> UserId {
    UserId::new("bob")
}

#[tokio::test]
async fn scenario_e_offline_then_online_conversation() {
    let (service, presence) = make_service();

    // Bob is offline: two messages persist as unread rows.
    for text in ["are you around?", "ping"] {
        let delivery = service.send(alice(), bob(), text.into()).await.unwrap();
        assert!(!delivery.delivered);
    }

    // Bob comes online and sees one unread group of two from alice.
    let counts = service.unread_counts(&bob()).await;
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].sender_id, alice());
    assert_eq!(counts[0].count, 2);

    // Bob opens the conversation and marks it read.
    assert_eq!(service.mark_read(&bob(), &alice()).await, 2);
    assert!(service.unread_counts(&bob()).await.is_empty());

    // Now that bob is registered, alice's next message is pushed live and
    // leaves no new row.
    let (tx, mut rx) = mpsc::unbounded_channel();
    presence.register(bob(), Connection::new(tx)).await;

    let delivery = service.send(alice(), bob(), "you there now?".into()).await.unwrap();
    assert!(delivery.delivered);
    let event = rx.try_recv().unwrap();
    assert!(matches!(event, ServerEvent::Message { sender_id, .. } if sender_id == alice()));

    let history = service.history(&alice(), &bob()).await;
    assert_eq!(history.len(), 2); // only the offline messages persisted
    assert!(history.iter().all(|m| m.is_read));
}

#[tokio::test]
async fn history_interleaves_both_directions_in_send_order() {
    let (service, _presence) = make_service();

    // Space the sends out so millisecond send times are distinct.
    service.send(alice(), bob(), "first".into()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    service.send(bob(), alice(), "second".into()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    service.send(alice(), bob(), "third".into()).await.unwrap();

    let history = service.history(&bob(), &alice()).await;
    let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["first", "second", "third"]);

    // Symmetric: either participant sees the same conversation.
    assert_eq!(service.history(&alice(), &bob()).await, history);
}

#[tokio::test]
async fn unread_counts_group_by_sender() {
    let (service, _presence) = make_service();
    let carol = UserId::new("carol");

    service.send(alice(), bob(), "a1".into()).await.unwrap();
    service.send(alice(), bob(), "a2".into()).await.unwrap();
    service.send(carol.clone(), bob(), "c1".into()).await.unwrap();
    // Traffic in the other direction must not count against bob.
    service.send(bob(), alice(), "reply".into()).await.unwrap();

    let counts = service.unread_counts(&bob()).await;
    assert_eq!(counts.len(), 2);
    let alice_count = counts.iter().find(|c| c.sender_id == alice()).unwrap();
    let carol_count = counts.iter().find(|c| c.sender_id == carol).unwrap();
    assert_eq!(alice_count.count, 2);
    assert_eq!(carol_count.count, 1);
}

#[tokio::test]
async fn mark_read_scopes_to_one_sender_and_is_idempotent() {
    let (service, _presence) = make_service();
    let carol = UserId::new("carol");

    service.send(alice(), bob(), "from alice".into()).await.unwrap();
    service.send(carol.clone(), bob(), "from carol".into()).await.unwrap();

    assert_eq!(service.mark_read(&bob(), &alice()).await, 1);
    assert_eq!(service.mark_read(&bob(), &alice()).await, 0);

    // Carol's message is untouched.
    let counts = service.unread_counts(&bob()).await;
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].sender_id, carol);
}

#[tokio::test]
async fn disconnect_routes_subsequent_sends_to_persistence() {
    let (service, presence) = make_service();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = Connection::new(tx);
    let conn_id = connection.conn_id;
    presence.register(bob(), connection).await;

    let delivery = service.send(alice(), bob(), "live".into()).await.unwrap();
    assert!(delivery.delivered);
    assert!(rx.try_recv().is_ok());

    // Bob disconnects cleanly.
    presence.remove_connection(conn_id).await;
    assert_eq!(presence.online_count().await, 0);

    let delivery = service.send(alice(), bob(), "stored".into()).await.unwrap();
    assert!(!delivery.delivered);

    // Only the post-disconnect message is on disk.
    let history = service.history(&alice(), &bob()).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text, "stored");
    assert!(!history[0].is_read);
}
