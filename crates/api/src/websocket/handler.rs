//! WebSocket handler for Axum
//!
//! Handles WebSocket connections, authentication, and event routing. Events
//! on a single connection are handled to completion in arrival order; events
//! from different connections interleave freely.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

use super::{
    chat::{relay_chat_message, MessageStore, OutboundMessage, PgMessageStore},
    connection::Connection,
    events::{ClientEvent, ServerEvent},
    state::WebSocketState,
};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: String,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
/// Authenticates via query parameter token instead of middleware Extension
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
) -> Result<Response, StatusCode> {
    let claims = match app_state.jwt_manager.validate_token(&params.token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = ?e, "WebSocket auth failed: invalid token");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // Verify user exists in database
    let user_id = match sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)",
    )
    .bind(claims.sub)
    .fetch_one(&app_state.pool)
    .await
    {
        Ok(true) => claims.sub,
        Ok(false) => {
            tracing::warn!(user_id = %claims.sub, "WebSocket auth failed: user not found");
            return Err(StatusCode::UNAUTHORIZED);
        }
        Err(e) => {
            tracing::error!(error = ?e, "WebSocket auth: database error");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    tracing::info!(user_id = %user_id, "WebSocket connection upgrade requested");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user_id, app_state)))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, user_id: Uuid, app_state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn = Connection::new(user_id, tx);
    let ws_state = app_state.ws_state.clone();
    let conn = ws_state.add_connection(conn).await;
    let session_id = conn.session_id;

    // Send connection acknowledgment
    let _ = conn.send(ServerEvent::Connected { session_id });

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    // Handle incoming messages
    let store = PgMessageStore::new(app_state.pool.clone());
    while let Some(msg) = receiver.next().await {
        if let Ok(msg) = msg {
            match msg {
                Message::Text(text) => {
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            handle_client_event(event, Arc::clone(&conn), &ws_state, &store)
                                .await;
                        }
                        Err(e) => {
                            tracing::warn!(
                                error = ?e,
                                message = %text,
                                "Failed to parse client event"
                            );
                            let _ = conn.send(ServerEvent::Error {
                                message: "Invalid event format".to_string(),
                            });
                        }
                    }
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %session_id, "WebSocket close frame received");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum handles ping/pong automatically
                }
                _ => {} // Ignore binary messages
            }
        }
    }

    // Cleanup on disconnect: presence entry and room memberships are removed
    // synchronously; in-flight sends are not rolled back
    tracing::info!(session_id = %session_id, user_id = %user_id, "WebSocket connection closing");
    ws_state.remove_connection(&session_id).await;

    send_task.abort();
}

/// Handle client event
async fn handle_client_event<S: MessageStore>(
    event: ClientEvent,
    conn: Arc<Connection>,
    ws_state: &WebSocketState,
    store: &S,
) {
    use ClientEvent::*;

    match event {
        Register { user_id } => {
            // The transport is already authenticated; a payload id that
            // disagrees with the token is a client bug, not a login
            if user_id != conn.user_id {
                let _ = conn.send(ServerEvent::Error {
                    message: "Cannot register as another user".to_string(),
                });
                return;
            }
            ws_state.presence.register(user_id, conn.session_id).await;
        }

        JoinRoom { booking_id } => {
            // Only booking participants may join its room
            match store.booking_participants(booking_id).await {
                Ok(Some((mentee_id, mentor_id)))
                    if conn.user_id == mentee_id || conn.user_id == mentor_id =>
                {
                    ws_state.rooms.join(booking_id, Arc::clone(&conn)).await;
                }
                Ok(_) => {
                    let _ = conn.send(ServerEvent::Error {
                        message: "Access denied to booking".to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to verify booking access");
                    let _ = conn.send(ServerEvent::Error {
                        message: "Failed to verify access".to_string(),
                    });
                }
            }
        }

        SendMessage {
            sender_id,
            receiver_id,
            booking_id,
            text,
        } => {
            if sender_id != conn.user_id {
                let _ = conn.send(ServerEvent::Error {
                    message: "Cannot send as another user".to_string(),
                });
                return;
            }

            let result = relay_chat_message(
                store,
                ws_state,
                conn.session_id,
                OutboundMessage {
                    sender_id,
                    receiver_id,
                    booking_id,
                    text,
                },
            )
            .await;

            if let Err(e) = result {
                tracing::error!(
                    error = ?e,
                    booking_id = %booking_id,
                    sender_id = %sender_id,
                    "Failed to persist chat message; fan-out skipped"
                );
                let _ = conn.send(ServerEvent::Error {
                    message: "Message could not be saved".to_string(),
                });
            }
        }

        Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::chat::{StoreError, StoredMessage};
    use time::OffsetDateTime;
    use tokio::sync::mpsc::error::TryRecvError;

    struct StubStore {
        participants: Option<(Uuid, Uuid)>,
    }

    impl MessageStore for StubStore {
        async fn save_message(&self, msg: &OutboundMessage) -> Result<StoredMessage, StoreError> {
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
            Ok("Stub".to_string())
        }

        async fn booking_participants(
            &self,
            _booking_id: Uuid,
        ) -> Result<Option<(Uuid, Uuid)>, StoreError> {
            Ok(self.participants)
        }
    }

    fn connected(user_id: Uuid) -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Connection::new(user_id, tx));
        (conn, rx)
    }

    #[tokio::test]
    async fn test_register_rejects_mismatched_user() {
        let ws_state = WebSocketState::new();
        let user_id = Uuid::new_v4();
        let (conn, mut rx) = connected(user_id);

        handle_client_event(
            ClientEvent::Register {
                user_id: Uuid::new_v4(),
            },
            Arc::clone(&conn),
            &ws_state,
            &StubStore { participants: None },
        )
        .await;

        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Error { .. })));
        assert!(ws_state.presence.lookup(&user_id).await.is_none());
    }

    #[tokio::test]
    async fn test_register_records_presence() {
        let ws_state = WebSocketState::new();
        let user_id = Uuid::new_v4();
        let (conn, mut rx) = connected(user_id);

        handle_client_event(
            ClientEvent::Register { user_id },
            Arc::clone(&conn),
            &ws_state,
            &StubStore { participants: None },
        )
        .await;

        assert_eq!(
            ws_state.presence.lookup(&user_id).await,
            Some(conn.session_id)
        );
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_join_room_requires_participation() {
        let ws_state = WebSocketState::new();
        let user_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();
        let (conn, mut rx) = connected(user_id);

        // Booking exists but belongs to two other users
        handle_client_event(
            ClientEvent::JoinRoom { booking_id },
            Arc::clone(&conn),
            &ws_state,
            &StubStore {
                participants: Some((Uuid::new_v4(), Uuid::new_v4())),
            },
        )
        .await;

        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Error { .. })));
        assert_eq!(ws_state.rooms.room_size(&booking_id).await, 0);
    }

    #[tokio::test]
    async fn test_join_room_as_participant() {
        let ws_state = WebSocketState::new();
        let user_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();
        let (conn, mut rx) = connected(user_id);

        handle_client_event(
            ClientEvent::JoinRoom { booking_id },
            Arc::clone(&conn),
            &ws_state,
            &StubStore {
                participants: Some((user_id, Uuid::new_v4())),
            },
        )
        .await;

        assert_eq!(ws_state.rooms.room_size(&booking_id).await, 1);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_join_unknown_booking_rejected() {
        let ws_state = WebSocketState::new();
        let (conn, mut rx) = connected(Uuid::new_v4());

        handle_client_event(
            ClientEvent::JoinRoom {
                booking_id: Uuid::new_v4(),
            },
            Arc::clone(&conn),
            &ws_state,
            &StubStore { participants: None },
        )
        .await;

        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_send_message_rejects_spoofed_sender() {
        let ws_state = WebSocketState::new();
        let (conn, mut rx) = connected(Uuid::new_v4());

        handle_client_event(
            ClientEvent::SendMessage {
                sender_id: Uuid::new_v4(),
                receiver_id: Uuid::new_v4(),
                booking_id: Uuid::new_v4(),
                text: "spoofed".to_string(),
            },
            Arc::clone(&conn),
            &ws_state,
            &StubStore { participants: None },
        )
        .await;

        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Error { .. })));
    }

    struct FailingStore;

    impl MessageStore for FailingStore {
        async fn save_message(&self, _msg: &OutboundMessage) -> Result<StoredMessage, StoreError> {
            Err(StoreError::Database("insert failed".into()))
        }

        async fn sender_display_name(&self, _user_id: Uuid) -> Result<String, StoreError> {
            Ok("Stub".to_string())
        }

        async fn booking_participants(
            &self,
            _booking_id: Uuid,
        ) -> Result<Option<(Uuid, Uuid)>, StoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_send_failure_acknowledged_to_sender() {
        let ws_state = WebSocketState::new();
        let user_id = Uuid::new_v4();
        let (conn, mut rx) = connected(user_id);

        handle_client_event(
            ClientEvent::SendMessage {
                sender_id: user_id,
                receiver_id: Uuid::new_v4(),
                booking_id: Uuid::new_v4(),
                text: "will not persist".to_string(),
            },
            Arc::clone(&conn),
            &ws_state,
            &FailingStore,
        )
        .await;

        // The sender is told the message was not saved
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let ws_state = WebSocketState::new();
        let (conn, mut rx) = connected(Uuid::new_v4());

        handle_client_event(
            ClientEvent::Ping,
            Arc::clone(&conn),
            &ws_state,
            &StubStore { participants: None },
        )
        .await;

        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Pong)));
    }
}
