//! WebSocket chat sessions.
//!
//! Each connection is a small actor: one reader loop consuming typed
//! [`ClientEvent`]s, one writer task draining the connection's outbound
//! channel. The session lifecycle:
//!
//! 1. Wait for a `register` event (anything else ends the connection).
//! 2. Register the principal in the presence registry (replacing any
//!    previous connection), ack with `registered`, and push the caller's
//!    current unread counts.
//! 3. Route `send_message` and `mark_read` events to the messaging engine.
//! 4. On disconnect, evict this connection from the registry.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use taskhub_core::ids::UserId;
use taskhub_core::protocol::{self, ClientEvent, ServerEvent};

use crate::chat::ChatError;
use crate::http::AppState;
use crate::presence::Connection;

/// Handles an upgraded WebSocket connection for a single principal.
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Some(user_id) = wait_for_register(&mut ws_receiver).await else {
        tracing::warn!("connection closed before registration");
        return;
    };

    tracing::info!(user_id = %user_id, "user registering");

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let connection = Connection::new(tx.clone());
    let conn_id = connection.conn_id;

    if state
        .chat
        .presence()
        .register(user_id.clone(), connection)
        .await
        .is_some()
    {
        tracing::info!(user_id = %user_id, "replaced existing connection");
        // The old sender is dropped, closing the previous writer channel.
    }

    let ack = ServerEvent::Registered {
        user_id: user_id.clone(),
    };
    if let Err(e) = send_event(&mut ws_sender, &ack).await {
        tracing::error!(user_id = %user_id, error = %e, "failed to send registered ack");
        state.chat.presence().remove_connection(conn_id).await;
        return;
    }

    // Unread counts drive the client's open-oldest-unread behavior on load.
    let counts = state.chat.unread_counts(&user_id).await;
    if let Err(e) = send_event(&mut ws_sender, &ServerEvent::UnreadCounts { counts }).await {
        tracing::warn!(user_id = %user_id, error = %e, "failed to push unread counts");
    }

    tracing::info!(user_id = %user_id, "user registered");

    // Writer task: forward queued events to the socket.
    let writer_user_id = user_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match protocol::encode_server(&event) {
                Ok(frame) => {
                    if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                        tracing::warn!(user_id = %writer_user_id, "WebSocket write failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(user_id = %writer_user_id, error = %e, "failed to encode event");
                }
            }
        }
    });

    // Reader loop: process events from this connection.
    let reader_user_id = user_id.clone();
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(frame) => {
                    handle_frame(&reader_user_id, frame.as_str(), &reader_state, &tx).await;
                }
                Message::Close(_) => {
                    tracing::info!(user_id = %reader_user_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore binary, ping, pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.chat.presence().remove_connection(conn_id).await;
    tracing::info!(user_id = %user_id, "user disconnected and unregistered");
}

/// Waits for the first frame, expecting a `register` event.
///
/// Returns the user id, or `None` if the connection closes or the first
/// event is anything else.
async fn wait_for_register(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<UserId> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(frame) => match protocol::decode_client(frame.as_str()) {
                Ok(ClientEvent::Register { user_id }) => {
                    if user_id.as_str().is_empty() {
                        tracing::warn!("received register with empty user id");
                        return None;
                    }
                    return Some(user_id);
                }
                Ok(other) => {
                    tracing::warn!(event = ?other, "expected register, got different event");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode registration frame");
                    return None;
                }
            },
            Message::Close(_) => return None,
            _ => {
                // Skip non-text frames (ping/pong) during registration.
            }
        }
    }
    None
}

/// Handles one decoded frame from a registered connection.
async fn handle_frame(
    session_user: &UserId,
    frame: &str,
    state: &Arc<AppState>,
    session_tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    let event = match protocol::decode_client(frame) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(user_id = %session_user, error = %e, "failed to decode frame");
            let _ = session_tx.send(ServerEvent::Error {
                reason: format!("malformed event: {e}"),
            });
            return;
        }
    };

    match event {
        ClientEvent::SendMessage {
            sender_id,
            receiver_id,
            text,
        } => {
            // Sender enforcement: the session identity wins over whatever
            // the frame claims.
            if sender_id != *session_user {
                tracing::warn!(
                    user_id = %session_user,
                    claimed = %sender_id,
                    "sender id mismatch, using session identity"
                );
            }
            let Some(receiver_id) = receiver_id else {
                tracing::warn!(user_id = %session_user, "send_message without receiver id");
                let _ = session_tx.send(ServerEvent::Error {
                    reason: ChatError::MissingReceiver.to_string(),
                });
                return;
            };

            match state.chat.send(session_user.clone(), receiver_id, text).await {
                Ok(delivery) => {
                    let _ = session_tx.send(ServerEvent::Sent {
                        delivered: delivery.delivered,
                    });
                }
                Err(e) => {
                    let _ = session_tx.send(ServerEvent::Error {
                        reason: e.to_string(),
                    });
                }
            }
        }
        ClientEvent::MarkRead { user_id, sender_id } => {
            if user_id != *session_user {
                tracing::warn!(
                    user_id = %session_user,
                    claimed = %user_id,
                    "mark_read for another user, using session identity"
                );
            }
            let updated = state.chat.mark_read(session_user, &sender_id).await;
            tracing::debug!(user_id = %session_user, sender = %sender_id, updated, "mark_read");

            let counts = state.chat.unread_counts(session_user).await;
            let _ = session_tx.send(ServerEvent::UnreadCounts { counts });
        }
        ClientEvent::Register { user_id } => {
            tracing::warn!(
                user_id = %session_user,
                new_id = %user_id,
                "duplicate register on established session"
            );
        }
    }
}

/// Encodes and sends a server event directly on a WebSocket sender.
async fn send_event(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &ServerEvent,
) -> Result<(), String> {
    let frame = protocol::encode_server(event).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Text(frame.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}
