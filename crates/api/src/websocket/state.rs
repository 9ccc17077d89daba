//! Global WebSocket state management
//!
//! Maintains global state for all WebSocket connections, presence, and rooms.
//! The registry and rooms are owned here and injected into the HTTP layer via
//! `AppState` rather than living as module globals, so handlers and tests can
//! work against an explicit instance.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;
use super::presence::PresenceRegistry;
use super::room::RoomManager;

/// Global WebSocket state shared across all connections
#[derive(Clone)]
pub struct WebSocketState {
    /// All active connections indexed by session_id
    pub connections: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,

    /// Online-user registry for direct delivery
    pub presence: Arc<PresenceRegistry>,

    /// Room manager for booking chat rooms
    pub rooms: Arc<RoomManager>,
}

impl WebSocketState {
    /// Create new WebSocket state
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            presence: Arc::new(PresenceRegistry::new()),
            rooms: Arc::new(RoomManager::new()),
        }
    }

    /// Add a connection
    pub async fn add_connection(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.session_id, Arc::clone(&conn));

        tracing::info!(
            session_id = %conn.session_id,
            user_id = %conn.user_id,
            total_connections = connections.len(),
            "WebSocket connection added"
        );

        conn
    }

    /// Remove a connection and clean up its presence entry and room
    /// memberships in the same call, so the registry never references a
    /// connection that has already closed
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.remove(session_id) {
            self.presence.unregister(session_id).await;
            self.rooms.remove_connection(session_id).await;

            tracing::info!(
                session_id = %session_id,
                user_id = %conn.user_id,
                remaining_connections = connections.len(),
                "WebSocket connection removed"
            );
        }
    }

    /// Get a connection by session ID
    pub async fn get_connection(&self, session_id: &Uuid) -> Option<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections.get(session_id).cloned()
    }

    /// Deliver an event directly to a user's registered connection
    ///
    /// Returns true if the event was handed to a live connection; false when
    /// the user has no presence entry (not an error, the event is skipped)
    pub async fn send_to_user(&self, user_id: &Uuid, event: ServerEvent) -> bool {
        let Some(session_id) = self.presence.lookup(user_id).await else {
            return false;
        };
        let Some(conn) = self.get_connection(&session_id).await else {
            return false;
        };
        conn.send(event).is_ok()
    }

    /// Get total number of active connections
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// Get statistics about the WebSocket state
    pub async fn stats(&self) -> WebSocketStats {
        WebSocketStats {
            active_connections: self.connection_count().await,
            online_users: self.presence.online_count().await,
            active_rooms: self.rooms.room_count().await,
        }
    }
}

impl Default for WebSocketState {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about WebSocket connections
#[derive(Debug, Clone)]
pub struct WebSocketStats {
    /// Number of active connections
    pub active_connections: usize,
    /// Number of users in the presence registry
    pub online_users: usize,
    /// Number of active booking rooms
    pub active_rooms: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_add_and_remove_connection() {
        let state = WebSocketState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let user_id = Uuid::new_v4();

        let conn = Connection::new(user_id, tx);
        let session_id = conn.session_id;

        // Add connection
        let added_conn = state.add_connection(conn).await;
        assert_eq!(state.connection_count().await, 1);
        assert_eq!(added_conn.user_id, user_id);

        // Remove connection
        state.remove_connection(&session_id).await;
        assert_eq!(state.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_connection_cleans_presence_and_rooms() {
        let state = WebSocketState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let user_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();

        let conn = state.add_connection(Connection::new(user_id, tx)).await;
        state.presence.register(user_id, conn.session_id).await;
        state.rooms.join(booking_id, Arc::clone(&conn)).await;

        state.remove_connection(&conn.session_id).await;

        // No stale presence entry or room membership survives a disconnect
        assert!(state.presence.lookup(&user_id).await.is_none());
        assert_eq!(state.rooms.room_size(&booking_id).await, 0);
    }

    #[tokio::test]
    async fn test_send_to_user_via_presence() {
        let state = WebSocketState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let user_id = Uuid::new_v4();

        let conn = state.add_connection(Connection::new(user_id, tx)).await;
        state.presence.register(user_id, conn.session_id).await;

        assert!(state.send_to_user(&user_id, ServerEvent::Pong).await);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_send_to_unregistered_user_is_skipped() {
        let state = WebSocketState::new();
        assert!(!state.send_to_user(&Uuid::new_v4(), ServerEvent::Pong).await);
    }

    #[tokio::test]
    async fn test_stats() {
        let state = WebSocketState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let user_id = Uuid::new_v4();

        let conn = state.add_connection(Connection::new(user_id, tx)).await;
        state.presence.register(user_id, conn.session_id).await;

        let stats = state.stats().await;
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.online_users, 1);
        assert_eq!(stats.active_rooms, 0);
    }
}
