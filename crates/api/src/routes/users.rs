//! Profile and mentor discovery routes

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use mentorhub_shared::UserRole;
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
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub social_links: Option<SocialLinksUpdate>,
    // Mentor-only fields
    pub expertise: Option<Vec<String>>,
    pub availability: Option<serde_json::Value>,
    // Mentee-only field
    pub learning_goals: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SocialLinksUpdate {
    pub linked_in: Option<String>,
    pub twitter: Option<String>,
    pub github: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SocialLinks {
    pub linked_in: String,
    pub twitter: String,
    pub github: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub avatar_url: String,
    pub title: String,
    pub bio: String,
    pub social_links: SocialLinks,
    pub learning_goals: Vec<String>,
    pub expertise: Vec<String>,
    pub availability: serde_json::Value,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct MentorListQuery {
    pub search: Option<String>,
    pub skill: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MentorSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub title: String,
    pub bio: String,
    pub avatar_url: String,
    pub expertise: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MentorListResponse {
    pub mentors: Vec<MentorSummary>,
    pub total_mentors: i64,
    pub current_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct MentorDetailResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub title: String,
    pub bio: String,
    pub avatar_url: String,
    pub expertise: Vec<String>,
    pub availability: serde_json::Value,
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct ProfileRow {
    id: Uuid,
    name: String,
    email: String,
    role: UserRole,
    avatar_url: String,
    title: String,
    bio: String,
    linkedin_url: String,
    twitter_url: String,
    github_url: String,
    learning_goals: Vec<String>,
    expertise: Vec<String>,
    availability: serde_json::Value,
    created_at: OffsetDateTime,
}

impl From<ProfileRow> for ProfileResponse {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
            avatar_url: row.avatar_url,
            title: row.title,
            bio: row.bio,
            social_links: SocialLinks {
                linked_in: row.linkedin_url,
                twitter: row.twitter_url,
                github: row.github_url,
            },
            learning_goals: row.learning_goals,
            expertise: row.expertise,
            availability: row.availability,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MentorSummaryRow {
    id: Uuid,
    name: String,
    email: String,
    title: String,
    bio: String,
    avatar_url: String,
    expertise: Vec<String>,
}

#[derive(Debug, FromRow)]
struct MentorDetailRow {
    id: Uuid,
    name: String,
    email: String,
    role: UserRole,
    title: String,
    bio: String,
    avatar_url: String,
    expertise: Vec<String>,
    availability: serde_json::Value,
}

const PROFILE_COLUMNS: &str = "id, name, email, role, avatar_url, title, bio, \
     linkedin_url, twitter_url, github_url, learning_goals, expertise, availability, created_at";

// =============================================================================
// Handlers
// =============================================================================

/// Get the authenticated user's profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<ProfileResponse>> {
    let row: ProfileRow = sqlx::query_as(&format!(
        "SELECT {} FROM users WHERE id = $1",
        PROFILE_COLUMNS
    ))
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(row.into()))
}

/// Update the authenticated user's profile
///
/// Merge semantics: only provided fields overwrite, and the mentor/mentee
/// field sets are applied according to the caller's role
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    if let Some(name) = &req.name {
        let name = name.trim();
        if name.is_empty() || name.len() > 120 {
            return Err(ApiError::Validation(
                "Name must be between 1 and 120 characters".to_string(),
            ));
        }
    }

    let social = req.social_links.as_ref();

    let row: ProfileRow = if auth_user.role.is_mentor() {
        sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                title = COALESCE($3, title),
                bio = COALESCE($4, bio),
                avatar_url = COALESCE($5, avatar_url),
                linkedin_url = COALESCE($6, linkedin_url),
                twitter_url = COALESCE($7, twitter_url),
                github_url = COALESCE($8, github_url),
                expertise = COALESCE($9, expertise),
                availability = COALESCE($10, availability),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(auth_user.user_id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(&req.title)
        .bind(&req.bio)
        .bind(&req.avatar_url)
        .bind(social.and_then(|s| s.linked_in.clone()))
        .bind(social.and_then(|s| s.twitter.clone()))
        .bind(social.and_then(|s| s.github.clone()))
        .bind(&req.expertise)
        .bind(&req.availability)
        .fetch_one(&state.pool)
        .await?
    } else {
        sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                title = COALESCE($3, title),
                bio = COALESCE($4, bio),
                avatar_url = COALESCE($5, avatar_url),
                linkedin_url = COALESCE($6, linkedin_url),
                twitter_url = COALESCE($7, twitter_url),
                github_url = COALESCE($8, github_url),
                learning_goals = COALESCE($9, learning_goals),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(auth_user.user_id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(&req.title)
        .bind(&req.bio)
        .bind(&req.avatar_url)
        .bind(social.and_then(|s| s.linked_in.clone()))
        .bind(social.and_then(|s| s.twitter.clone()))
        .bind(social.and_then(|s| s.github.clone()))
        .bind(&req.learning_goals)
        .fetch_one(&state.pool)
        .await?
    };

    tracing::info!(user_id = %auth_user.user_id, "Profile updated");

    Ok(Json(row.into()))
}

/// List mentors with optional name search, skill filter, and pagination
pub async fn list_mentors(
    State(state): State<AppState>,
    Query(query): Query<MentorListQuery>,
) -> ApiResult<Json<MentorListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(9).clamp(1, 50);
    let offset = (page - 1) * limit;

    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let skill = query.skill.as_deref().map(str::trim).filter(|s| !s.is_empty());

    // Total count uses the same filters so page math stays correct
    let total_mentors: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM users
        WHERE role = 'mentor'
          AND ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR EXISTS (
              SELECT 1 FROM unnest(expertise) AS skill WHERE skill ILIKE '%' || $2 || '%'
          ))
        "#,
    )
    .bind(search)
    .bind(skill)
    .fetch_one(&state.pool)
    .await?;

    let mentors: Vec<MentorSummaryRow> = sqlx::query_as(
        r#"
        SELECT id, name, email, title, bio, avatar_url, expertise
        FROM users
        WHERE role = 'mentor'
          AND ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR EXISTS (
              SELECT 1 FROM unnest(expertise) AS skill WHERE skill ILIKE '%' || $2 || '%'
          ))
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(search)
    .bind(skill)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total_pages = if total_mentors == 0 {
        0
    } else {
        (total_mentors + limit - 1) / limit
    };

    Ok(Json(MentorListResponse {
        mentors: mentors
            .into_iter()
            .map(|row| MentorSummary {
                id: row.id,
                name: row.name,
                email: row.email,
                title: row.title,
                bio: row.bio,
                avatar_url: row.avatar_url,
                expertise: row.expertise,
            })
            .collect(),
        total_mentors,
        current_page: page,
        total_pages,
    }))
}

/// Get a single mentor by ID
pub async fn get_mentor(
    State(state): State<AppState>,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<Json<MentorDetailResponse>> {
    let mentor: Option<MentorDetailRow> = sqlx::query_as(
        r#"
        SELECT id, name, email, role, title, bio, avatar_url, expertise, availability
        FROM users
        WHERE id = $1 AND role = 'mentor'
        "#,
    )
    .bind(mentor_id)
    .fetch_optional(&state.pool)
    .await?;

    let mentor = mentor.ok_or(ApiError::NotFound)?;

    Ok(Json(MentorDetailResponse {
        id: mentor.id,
        name: mentor.name,
        email: mentor.email,
        role: mentor.role,
        title: mentor.title,
        bio: mentor.bio,
        avatar_url: mentor.avatar_url,
        expertise: mentor.expertise,
        availability: mentor.availability,
    }))
}
