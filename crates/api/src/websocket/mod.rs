//! WebSocket support for real-time features
//!
//! Provides the live channel for booking-scoped chat and notifications:
//! - Presence registry (which users currently have an open connection)
//! - Booking rooms for broadcasting chat events to participants
//! - The chat send pipeline (persist, then fan out)
//! - Direct notifications (new message, new booking request)
//!
//! # Architecture
//!
//! - **Connection**: Represents an authenticated WebSocket connection
//! - **Presence**: user-to-connection registry for direct delivery
//! - **Room**: Booking-based pub/sub for broadcasting events
//! - **State**: Global WebSocket state shared across all connections
//! - **Chat**: Persist-then-broadcast message relay
//! - **Handler**: Axum WebSocket route handler
//! - **Events**: Type-safe event definitions for client/server communication
//!
//! Delivery is fire-and-forget by design: a recipient that is offline (or
//! whose send fails) simply misses the live event and recovers it from the
//! persisted chat history over HTTP. Guaranteed delivery is a non-goal.

pub mod chat;
pub mod connection;
pub mod events;
pub mod handler;
pub mod presence;
pub mod room;
pub mod state;

pub use handler::ws_handler;
pub use state::WebSocketState;
