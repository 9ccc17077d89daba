//! Review and rating routes

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
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct MentorReview {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: OffsetDateTime,
    pub mentee: ReviewAuthor,
}

#[derive(Debug, Serialize)]
pub struct ReviewAuthor {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: String,
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: Uuid,
    booking_id: Uuid,
    mentor_id: Uuid,
    mentee_id: Uuid,
    rating: i32,
    comment: Option<String>,
    created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct BookingGateRow {
    mentee_id: Uuid,
    mentor_id: Uuid,
    status: BookingStatus,
    has_been_reviewed: bool,
}

#[derive(Debug, FromRow)]
struct MentorReviewRow {
    id: Uuid,
    booking_id: Uuid,
    rating: i32,
    comment: Option<String>,
    created_at: OffsetDateTime,
    mentee_id: Uuid,
    mentee_name: String,
    mentee_avatar_url: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a review for a completed booking
pub async fn create_review(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<ReviewResponse>)> {
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let booking: Option<BookingGateRow> = sqlx::query_as(
        "SELECT mentee_id, mentor_id, status, has_been_reviewed FROM bookings WHERE id = $1",
    )
    .bind(req.booking_id)
    .fetch_optional(&state.pool)
    .await?;

    let booking = booking.ok_or(ApiError::NotFound)?;

    // Only the mentee who booked the session may review it
    if booking.mentee_id != auth_user.user_id {
        return Err(ApiError::Forbidden);
    }

    if !booking.status.is_reviewable() {
        return Err(ApiError::BadRequest(
            "Booking is not completed yet".to_string(),
        ));
    }

    if booking.has_been_reviewed {
        return Err(ApiError::BadRequest(
            "Booking has already been reviewed".to_string(),
        ));
    }

    // The review row and the reviewed flag land together or not at all
    let mut tx = state.pool.begin().await?;

    let review: ReviewRow = sqlx::query_as(
        r#"
        INSERT INTO reviews (booking_id, mentor_id, mentee_id, rating, comment)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, booking_id, mentor_id, mentee_id, rating, comment, created_at
        "#,
    )
    .bind(req.booking_id)
    .bind(booking.mentor_id)
    .bind(auth_user.user_id)
    .bind(req.rating)
    .bind(&req.comment)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE bookings SET has_been_reviewed = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(req.booking_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        review_id = %review.id,
        booking_id = %req.booking_id,
        rating = req.rating,
        "Review created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse {
            id: review.id,
            booking_id: review.booking_id,
            mentor_id: review.mentor_id,
            mentee_id: review.mentee_id,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
        }),
    ))
}

/// List all reviews for a mentor, newest first
pub async fn list_mentor_reviews(
    State(state): State<AppState>,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MentorReview>>> {
    let rows: Vec<MentorReviewRow> = sqlx::query_as(
        r#"
        SELECT r.id, r.booking_id, r.rating, r.comment, r.created_at,
               u.id AS mentee_id, u.name AS mentee_name, u.avatar_url AS mentee_avatar_url
        FROM reviews r
        JOIN users u ON u.id = r.mentee_id
        WHERE r.mentor_id = $1
        ORDER BY r.created_at DESC
        "#,
    )
    .bind(mentor_id)
    .fetch_all(&state.pool)
    .await?;

    let reviews = rows
        .into_iter()
        .map(|row| MentorReview {
            id: row.id,
            booking_id: row.booking_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
            mentee: ReviewAuthor {
                id: row.mentee_id,
                name: row.mentee_name,
                avatar_url: row.mentee_avatar_url,
            },
        })
        .collect();

    Ok(Json(reviews))
}
