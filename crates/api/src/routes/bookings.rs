//! Booking lifecycle routes

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use mentorhub_shared::BookingStatus;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    websocket::events::{BookingEvent, ServerEvent},
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub mentor_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub session_date: OffsetDateTime,
    pub session_time_slot: String,
    pub user_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub mentee_id: Uuid,
    pub mentor_id: Uuid,
    pub session_date: OffsetDateTime,
    pub session_time_slot: String,
    pub status: BookingStatus,
    pub user_message: Option<String>,
    pub has_been_reviewed: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct BookingParty {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct BookingWithParties {
    #[serde(flatten)]
    pub booking: BookingResponse,
    pub mentor: BookingParty,
    pub mentee: BookingParty,
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct BookingRow {
    id: Uuid,
    mentee_id: Uuid,
    mentor_id: Uuid,
    session_date: OffsetDateTime,
    session_time_slot: String,
    status: BookingStatus,
    user_message: Option<String>,
    has_been_reviewed: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<BookingRow> for BookingResponse {
    fn from(row: BookingRow) -> Self {
        Self {
            id: row.id,
            mentee_id: row.mentee_id,
            mentor_id: row.mentor_id,
            session_date: row.session_date,
            session_time_slot: row.session_time_slot,
            status: row.status,
            user_message: row.user_message,
            has_been_reviewed: row.has_been_reviewed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BookingWithPartiesRow {
    id: Uuid,
    mentee_id: Uuid,
    mentor_id: Uuid,
    session_date: OffsetDateTime,
    session_time_slot: String,
    status: BookingStatus,
    user_message: Option<String>,
    has_been_reviewed: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    mentor_name: String,
    mentor_email: String,
    mentee_name: String,
    mentee_email: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a new booking request
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<BookingResponse>)> {
    if req.session_time_slot.trim().is_empty() {
        return Err(ApiError::Validation(
            "Session time slot is required".to_string(),
        ));
    }

    // The target must be an actual mentor account
    let is_mentor: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND role = 'mentor')",
    )
    .bind(req.mentor_id)
    .fetch_one(&state.pool)
    .await?;

    if !is_mentor {
        return Err(ApiError::BadRequest("Mentor not found".to_string()));
    }

    let booking: BookingRow = sqlx::query_as(
        r#"
        INSERT INTO bookings (mentee_id, mentor_id, session_date, session_time_slot, user_message)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, mentee_id, mentor_id, session_date, session_time_slot, status,
                  user_message, has_been_reviewed, created_at, updated_at
        "#,
    )
    .bind(auth_user.user_id)
    .bind(req.mentor_id)
    .bind(req.session_date)
    .bind(req.session_time_slot.trim())
    .bind(&req.user_message)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(
        booking_id = %booking.id,
        mentee_id = %auth_user.user_id,
        mentor_id = %req.mentor_id,
        "Booking created"
    );

    // Best-effort live notification; the mentor being offline is not an error
    let delivered = state
        .ws_state
        .send_to_user(
            &req.mentor_id,
            ServerEvent::NewBookingRequest {
                message: format!("You have a new session request from {}", auth_user.name),
                booking: BookingEvent {
                    id: booking.id,
                    mentee_id: booking.mentee_id,
                    mentor_id: booking.mentor_id,
                    session_date: booking.session_date,
                    session_time_slot: booking.session_time_slot.clone(),
                    status: booking.status.to_string(),
                    user_message: booking.user_message.clone(),
                    created_at: booking.created_at,
                },
            },
        )
        .await;

    if !delivered {
        tracing::debug!(mentor_id = %req.mentor_id, "Mentor offline; no booking notification sent");
    }

    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// List bookings where the caller is either the mentee or the mentor
pub async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<BookingWithParties>>> {
    let rows: Vec<BookingWithPartiesRow> = sqlx::query_as(
        r#"
        SELECT b.id, b.mentee_id, b.mentor_id, b.session_date, b.session_time_slot,
               b.status, b.user_message, b.has_been_reviewed, b.created_at, b.updated_at,
               mentor.name AS mentor_name, mentor.email AS mentor_email,
               mentee.name AS mentee_name, mentee.email AS mentee_email
        FROM bookings b
        JOIN users mentor ON mentor.id = b.mentor_id
        JOIN users mentee ON mentee.id = b.mentee_id
        WHERE b.mentee_id = $1 OR b.mentor_id = $1
        ORDER BY b.created_at DESC
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let bookings = rows
        .into_iter()
        .map(|row| BookingWithParties {
            mentor: BookingParty {
                id: row.mentor_id,
                name: row.mentor_name,
                email: row.mentor_email,
            },
            mentee: BookingParty {
                id: row.mentee_id,
                name: row.mentee_name,
                email: row.mentee_email,
            },
            booking: BookingResponse {
                id: row.id,
                mentee_id: row.mentee_id,
                mentor_id: row.mentor_id,
                session_date: row.session_date,
                session_time_slot: row.session_time_slot,
                status: row.status,
                user_message: row.user_message,
                has_been_reviewed: row.has_been_reviewed,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        })
        .collect();

    Ok(Json(bookings))
}

/// Update a booking's status (confirm/reject/complete)
///
/// Either participant may set any of the four statuses; the only gate is
/// the ownership check
pub async fn update_booking_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<UpdateBookingStatusRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let participants: Option<(Uuid, Uuid)> =
        sqlx::query_as("SELECT mentee_id, mentor_id FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&state.pool)
            .await?;

    let (mentee_id, mentor_id) = participants.ok_or(ApiError::NotFound)?;

    if auth_user.user_id != mentee_id && auth_user.user_id != mentor_id {
        return Err(ApiError::Forbidden);
    }

    let booking: BookingRow = sqlx::query_as(
        r#"
        UPDATE bookings
        SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING id, mentee_id, mentor_id, session_date, session_time_slot, status,
                  user_message, has_been_reviewed, created_at, updated_at
        "#,
    )
    .bind(booking_id)
    .bind(req.status)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(
        booking_id = %booking_id,
        user_id = %auth_user.user_id,
        status = %booking.status,
        "Booking status updated"
    );

    Ok(Json(booking.into()))
}
