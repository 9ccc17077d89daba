//! WebSocket event types and serialization
//!
//! Defines all client-to-server and server-to-client event types
//! with type-safe serde serialization.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Announce presence after connecting; enables direct notifications
    Register { user_id: Uuid },

    /// Join the chat room for a booking
    JoinRoom { booking_id: Uuid },

    /// Send a chat message within a booking
    SendMessage {
        sender_id: Uuid,
        receiver_id: Uuid,
        booking_id: Uuid,
        text: String,
    },

    /// Heartbeat ping to keep connection alive
    Ping,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Connection acknowledged
    Connected { session_id: Uuid },

    /// Chat message delivered to other members of the booking room
    ReceiveMessage {
        booking_id: Uuid,
        sender: MessageSender,
        text: String,
        #[serde(with = "time::serde::rfc3339")]
        created_at: OffsetDateTime,
    },

    /// Out-of-room alert for the receiving user (e.g. a sidebar badge)
    NewMessageNotification {
        booking_id: Uuid,
        sender_name: String,
    },

    /// A mentee requested a session; delivered to the mentor's connection
    NewBookingRequest {
        message: String,
        booking: BookingEvent,
    },

    /// Heartbeat response
    Pong,

    /// Error message
    Error { message: String },
}

// =============================================================================
// Event Data Structures
// =============================================================================

/// Sender reference carried on a relayed chat message
#[derive(Debug, Serialize, Clone)]
pub struct MessageSender {
    pub id: Uuid,
}

/// Booking data carried on a new-booking notification
#[derive(Debug, Serialize, Clone)]
pub struct BookingEvent {
    pub id: Uuid,
    pub mentee_id: Uuid,
    pub mentor_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub session_date: OffsetDateTime,
    pub session_time_slot: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_deserialization() {
        let json = r#"{"type":"join_room","booking_id":"550e8400-e29b-41d4-a716-446655440000"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::JoinRoom { booking_id } => {
                assert_eq!(
                    booking_id.to_string(),
                    "550e8400-e29b-41d4-a716-446655440000"
                );
            }
            _ => panic!("Expected JoinRoom event"),
        }
    }

    #[test]
    fn test_send_message_deserialization() {
        let json = r#"{
            "type": "send_message",
            "sender_id": "550e8400-e29b-41d4-a716-446655440000",
            "receiver_id": "550e8400-e29b-41d4-a716-446655440001",
            "booking_id": "550e8400-e29b-41d4-a716-446655440002",
            "text": "hi"
        }"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::SendMessage { text, .. } => assert_eq!(text, "hi"),
            _ => panic!("Expected SendMessage event"),
        }
    }

    #[test]
    fn test_server_event_serialization() {
        let event = ServerEvent::Pong;
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_notification_serialization() {
        let event = ServerEvent::NewMessageNotification {
            booking_id: Uuid::nil(),
            sender_name: "Ada".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("new_message_notification"));
        assert!(json.contains("Ada"));
    }

    #[test]
    fn test_error_event_serialization() {
        let event = ServerEvent::Error {
            message: "Test error".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Test error"));
    }
}
