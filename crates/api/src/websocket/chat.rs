//! Chat message relay
//!
//! The single state transition of the live channel: "a chat message is
//! sent". The message is persisted before any fan-out; if persistence
//! fails, nothing is broadcast (a recipient must never see a message it
//! cannot later retrieve from history) and the caller reports the failure
//! back to the sender's connection.
//!
//! Persistence is accessed through the `MessageStore` capability so the
//! pipeline can be exercised in tests with an in-memory or failing store.

use sqlx::{FromRow, PgPool};
use std::future::Future;
use time::OffsetDateTime;
use uuid::Uuid;

use super::events::{MessageSender, ServerEvent};
use super::state::WebSocketState;

/// An inbound chat message, as supplied by the sending client
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub booking_id: Uuid,
    pub text: String,
}

/// A chat message row after persistence
#[derive(Debug, Clone, FromRow)]
pub struct StoredMessage {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub body: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Persistence capability used by the relay and the join authorization check
pub trait MessageStore: Send + Sync {
    /// Persist a chat message, returning the stored row
    fn save_message(
        &self,
        msg: &OutboundMessage,
    ) -> impl Future<Output = Result<StoredMessage, StoreError>> + Send;

    /// Display name of a user, for notification payloads
    fn sender_display_name(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// The (mentee, mentor) pair of a booking, or None if it does not exist
    fn booking_participants(
        &self,
        booking_id: Uuid,
    ) -> impl Future<Output = Result<Option<(Uuid, Uuid)>, StoreError>> + Send;
}

/// Postgres-backed message store used in production
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl MessageStore for PgMessageStore {
    async fn save_message(&self, msg: &OutboundMessage) -> Result<StoredMessage, StoreError> {
        let stored: StoredMessage = sqlx::query_as(
            r#"
            INSERT INTO messages (booking_id, sender_id, receiver_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, booking_id, sender_id, receiver_id, body, created_at
            "#,
        )
        .bind(msg.booking_id)
        .bind(msg.sender_id)
        .bind(msg.receiver_id)
        .bind(&msg.text)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn sender_display_name(&self, user_id: Uuid) -> Result<String, StoreError> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(name.unwrap_or_else(|| "Unknown".to_string()))
    }

    async fn booking_participants(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<(Uuid, Uuid)>, StoreError> {
        let row: Option<(Uuid, Uuid)> =
            sqlx::query_as("SELECT mentee_id, mentor_id FROM bookings WHERE id = $1")
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row)
    }
}

/// Persist a chat message and fan it out
///
/// Order matters: the database write completes (or fails) before any
/// delivery. On success the message is broadcast to the booking room
/// excluding the sender's own session, and the receiver additionally gets a
/// direct notification if present in the registry. The direct path fires
/// even when the receiver is joined to the room; surfaces that already show
/// the room decide whether to suppress the badge.
pub async fn relay_chat_message<S: MessageStore>(
    store: &S,
    ws: &WebSocketState,
    sender_session: Uuid,
    msg: OutboundMessage,
) -> Result<StoredMessage, StoreError> {
    // Broadcast only on persisted-success
    let stored = store.save_message(&msg).await?;

    ws.rooms
        .broadcast(
            &msg.booking_id,
            ServerEvent::ReceiveMessage {
                booking_id: stored.booking_id,
                sender: MessageSender {
                    id: stored.sender_id,
                },
                text: stored.body.clone(),
                created_at: stored.created_at,
            },
            Some(&sender_session),
        )
        .await;

    if ws.presence.lookup(&msg.receiver_id).await.is_some() {
        let sender_name = store
            .sender_display_name(msg.sender_id)
            .await
            .unwrap_or_else(|_| "Unknown".to_string());

        let delivered = ws
            .send_to_user(
                &msg.receiver_id,
                ServerEvent::NewMessageNotification {
                    booking_id: msg.booking_id,
                    sender_name,
                },
            )
            .await;

        if !delivered {
            tracing::debug!(
                receiver_id = %msg.receiver_id,
                "Receiver registry entry raced disconnect; notification skipped"
            );
        }
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::Connection;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct FakeStore {
        fail_save: bool,
    }

    impl MessageStore for FakeStore {
        async fn save_message(&self, msg: &OutboundMessage) -> Result<StoredMessage, StoreError> {
            if self.fail_save {
                return Err(StoreError::Database("connection refused".into()));
            }
            Ok(StoredMessage {
                id: Uuid::new_v4(),
                booking_id: msg.booking_id,
                sender_id: msg.sender_id,
                receiver_id: msg.receiver_id,
                body: msg.text.clone(),
                created_at: OffsetDateTime::now_utc(),
            })
        }

        async fn sender_display_name(&self, _user_id: Uuid) -> Result<String, StoreError> {
            Ok("Ada Lovelace".to_string())
        }

        async fn booking_participants(
            &self,
            _booking_id: Uuid,
        ) -> Result<Option<(Uuid, Uuid)>, StoreError> {
            Ok(None)
        }
    }

    struct Member {
        conn: Arc<Connection>,
        rx: mpsc::UnboundedReceiver<ServerEvent>,
    }

    async fn join_member(ws: &WebSocketState, booking_id: Uuid, user_id: Uuid) -> Member {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = ws.add_connection(Connection::new(user_id, tx)).await;
        ws.presence.register(user_id, conn.session_id).await;
        ws.rooms.join(booking_id, Arc::clone(&conn)).await;
        Member { conn, rx }
    }

    #[tokio::test]
    async fn test_message_relayed_to_other_member_only() {
        let ws = WebSocketState::new();
        let booking_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();
        let receiver_id = Uuid::new_v4();

        let mut sender = join_member(&ws, booking_id, sender_id).await;
        let mut receiver = join_member(&ws, booking_id, receiver_id).await;

        let stored = relay_chat_message(
            &FakeStore { fail_save: false },
            &ws,
            sender.conn.session_id,
            OutboundMessage {
                sender_id,
                receiver_id,
                booking_id,
                text: "hi".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(stored.body, "hi");
        assert_eq!(stored.booking_id, booking_id);

        // The other member receives exactly one receive_message with the text
        match receiver.rx.try_recv() {
            Ok(ServerEvent::ReceiveMessage {
                booking_id: b,
                sender: s,
                text,
                ..
            }) => {
                assert_eq!(b, booking_id);
                assert_eq!(s.id, sender_id);
                assert_eq!(text, "hi");
            }
            other => panic!("expected receive_message, got {:?}", other),
        }

        // The receiver also gets the direct notification (both paths fire)
        match receiver.rx.try_recv() {
            Ok(ServerEvent::NewMessageNotification {
                booking_id: b,
                sender_name,
            }) => {
                assert_eq!(b, booking_id);
                assert_eq!(sender_name, "Ada Lovelace");
            }
            other => panic!("expected new_message_notification, got {:?}", other),
        }
        assert!(receiver.rx.try_recv().is_err());

        // The sender receives nothing
        assert!(sender.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notification_delivered_outside_room() {
        let ws = WebSocketState::new();
        let booking_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();
        let receiver_id = Uuid::new_v4();

        let sender = join_member(&ws, booking_id, sender_id).await;

        // Receiver is registered (online) but not joined to the room
        let (tx, mut receiver_rx) = mpsc::unbounded_channel();
        let receiver_conn = ws.add_connection(Connection::new(receiver_id, tx)).await;
        ws.presence
            .register(receiver_id, receiver_conn.session_id)
            .await;

        relay_chat_message(
            &FakeStore { fail_save: false },
            &ws,
            sender.conn.session_id,
            OutboundMessage {
                sender_id,
                receiver_id,
                booking_id,
                text: "hello?".to_string(),
            },
        )
        .await
        .unwrap();

        // Exactly one direct notification, no room broadcast
        match receiver_rx.try_recv() {
            Ok(ServerEvent::NewMessageNotification { sender_name, .. }) => {
                assert_eq!(sender_name, "Ada Lovelace");
            }
            other => panic!("expected new_message_notification, got {:?}", other),
        }
        assert!(receiver_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_offline_receiver_is_skipped() {
        let ws = WebSocketState::new();
        let booking_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();

        let sender = join_member(&ws, booking_id, sender_id).await;

        let result = relay_chat_message(
            &FakeStore { fail_save: false },
            &ws,
            sender.conn.session_id,
            OutboundMessage {
                sender_id,
                receiver_id: Uuid::new_v4(), // never registered
                booking_id,
                text: "anyone there".to_string(),
            },
        )
        .await;

        // Absence is not an error; the message still persists and relays
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_persistence_failure_suppresses_broadcast() {
        let ws = WebSocketState::new();
        let booking_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();
        let receiver_id = Uuid::new_v4();

        let sender = join_member(&ws, booking_id, sender_id).await;
        let mut receiver = join_member(&ws, booking_id, receiver_id).await;

        let result = relay_chat_message(
            &FakeStore { fail_save: true },
            &ws,
            sender.conn.session_id,
            OutboundMessage {
                sender_id,
                receiver_id,
                booking_id,
                text: "lost".to_string(),
            },
        )
        .await;

        assert!(result.is_err());
        // No receive_message and no notification reached the other member
        assert!(receiver.rx.try_recv().is_err());
    }
}
