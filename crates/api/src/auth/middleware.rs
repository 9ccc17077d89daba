//! Authentication middleware
//!
//! Validates the Bearer token on protected routes and loads the account row
//! into an `AuthUser` request extension for handlers.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use mentorhub_shared::UserRole;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    auth::jwt::JwtManager,
    error::{ApiError, ApiResult},
};

/// State required to authenticate requests
#[derive(Clone)]
pub struct AuthState {
    pub pool: PgPool,
    pub jwt_manager: JwtManager,
}

/// Authenticated user attached to the request by `require_auth`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, FromRow)]
struct AuthUserRow {
    id: Uuid,
    name: String,
    email: String,
    role: UserRole,
}

/// Extract the Bearer token from an Authorization header value
fn extract_bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware requiring a valid token and an existing account
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or(ApiError::Unauthorized)?;

    let claims = auth_state
        .jwt_manager
        .validate_token(token)
        .map_err(|_| ApiError::InvalidToken)?;

    // Token may outlive the account; re-check the row on every request
    let user: Option<AuthUserRow> =
        sqlx::query_as("SELECT id, name, email, role FROM users WHERE id = $1")
            .bind(claims.sub)
            .fetch_optional(&auth_state.pool)
            .await?;

    let user = user.ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(AuthUser {
        user_id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
    });

    Ok(next.run(req).await)
}
