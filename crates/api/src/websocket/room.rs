//! Booking room management for pub/sub
//!
//! Manages booking "rooms" for broadcasting chat events to participants.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;

/// Manages booking "rooms" for broadcasting events
pub struct RoomManager {
    /// Map of booking_id -> list of member connections
    rooms: Arc<RwLock<HashMap<Uuid, Vec<Arc<Connection>>>>>,
}

impl RoomManager {
    /// Create a new room manager
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a connection to a booking room; joining twice is a no-op
    pub async fn join(&self, booking_id: Uuid, conn: Arc<Connection>) {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(booking_id).or_insert_with(Vec::new);
        if members.iter().any(|c| c.session_id == conn.session_id) {
            return;
        }
        members.push(Arc::clone(&conn));

        tracing::debug!(
            booking_id = %booking_id,
            session_id = %conn.session_id,
            room_size = members.len(),
            "Connection joined booking room"
        );
    }

    /// Remove a connection from a booking room
    pub async fn leave(&self, booking_id: &Uuid, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(booking_id) {
            members.retain(|c| c.session_id != *session_id);

            // Clean up empty rooms
            if members.is_empty() {
                rooms.remove(booking_id);
                tracing::debug!(
                    booking_id = %booking_id,
                    "Removed empty booking room"
                );
            }
        }
    }

    /// Broadcast an event to all members of a booking room, skipping the
    /// excluded session (the sender, when relaying chat)
    ///
    /// Delivery is fire-and-forget: send errors are logged and skipped, and
    /// closed connections are cleaned up on disconnect
    pub async fn broadcast(
        &self,
        booking_id: &Uuid,
        event: ServerEvent,
        exclude_session: Option<&Uuid>,
    ) {
        let rooms = self.rooms.read().await;
        if let Some(members) = rooms.get(booking_id) {
            let mut delivered = 0;
            let mut failed = 0;

            for conn in members {
                if exclude_session == Some(&conn.session_id) {
                    continue;
                }
                match conn.send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(_) => {
                        failed += 1;
                        tracing::warn!(
                            session_id = %conn.session_id,
                            "Failed to send event to connection (likely closed)"
                        );
                    }
                }
            }

            tracing::debug!(
                booking_id = %booking_id,
                recipients = delivered,
                failed = failed,
                "Broadcast event to booking room"
            );
        } else {
            tracing::debug!(
                booking_id = %booking_id,
                "No room found for booking - no members"
            );
        }
    }

    /// Remove a connection from all rooms
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        for members in rooms.values_mut() {
            members.retain(|c| c.session_id != *session_id);
        }

        // Clean up empty rooms
        rooms.retain(|_, members| !members.is_empty());
    }

    /// Get room size (number of connections) for a booking
    pub async fn room_size(&self, booking_id: &Uuid) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(booking_id).map(|v| v.len()).unwrap_or(0)
    }

    /// Get total number of active rooms
    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
