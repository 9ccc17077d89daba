//! Chat history routes
//!
//! History is the durable side of the live relay: messages are returned
//! ascending by creation time so a fetched transcript lines up with the
//! live-append order a connected client saw.

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub sender: ChatSender,
    pub text: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct ChatSender {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    booking_id: Uuid,
    sender_id: Uuid,
    sender_name: String,
    body: String,
    created_at: OffsetDateTime,
}

// =============================================================================
// Handlers
// =============================================================================

/// Get all messages for a booking, oldest first
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let participants: Option<(Uuid, Uuid)> =
        sqlx::query_as("SELECT mentee_id, mentor_id FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&state.pool)
            .await?;

    let (mentee_id, mentor_id) = participants.ok_or(ApiError::NotFound)?;

    if auth_user.user_id != mentee_id && auth_user.user_id != mentor_id {
        return Err(ApiError::Forbidden);
    }

    let rows: Vec<MessageRow> = sqlx::query_as(
        r#"
        SELECT m.id, m.booking_id, m.sender_id, u.name AS sender_name, m.body, m.created_at
        FROM messages m
        JOIN users u ON u.id = m.sender_id
        WHERE m.booking_id = $1
        ORDER BY m.created_at ASC
        "#,
    )
    .bind(booking_id)
    .fetch_all(&state.pool)
    .await?;

    let messages = rows
        .into_iter()
        .map(|row| ChatMessage {
            id: row.id,
            booking_id: row.booking_id,
            sender: ChatSender {
                id: row.sender_id,
                name: row.sender_name,
            },
            text: row.body,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(messages))
}
