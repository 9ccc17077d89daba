//! Authentication routes

use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use mentorhub_shared::{AuthProvider, RateLimitDecision, UserRole};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    auth::{
        generate_impossible_hash, hash_password, validate_password, verify_password, AuthUser,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::extract_client_ip;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthLoginRequest {
    pub name: String,
    pub email: String,
    pub provider: AuthProvider,
    pub provider_id: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub avatar_url: String,
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct UserAuthRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: UserRole,
    auth_provider: AuthProvider,
    avatar_url: String,
}

#[derive(Debug, FromRow)]
struct UserSummaryRow {
    id: Uuid,
    name: String,
    email: String,
    role: UserRole,
    avatar_url: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Minimal email shape check; real validation happens at delivery time
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn check_auth_rate_limit(state: &AppState, ip: &Option<String>) -> ApiResult<()> {
    if let Some(ip) = ip {
        if let RateLimitDecision::Blocked {
            retry_after_seconds,
        } = state.rate_limiter.check(ip)
        {
            tracing::warn!(ip = %ip, "Auth rate limit exceeded");
            return Err(ApiError::TooManyRequests(format!(
                "Too many attempts. Please try again in {} seconds.",
                retry_after_seconds
            )));
        }
    }
    Ok(())
}

fn auth_response(state: &AppState, user: UserResponse) -> ApiResult<AuthResponse> {
    let token = state
        .jwt_manager
        .generate_token(user.id, &user.role.to_string(), &user.email)
        .map_err(|_| ApiError::Internal)?;

    Ok(AuthResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_manager.token_expiry_seconds(),
        user,
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new user with credentials
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let ip_address = extract_client_ip(&headers);
    check_auth_rate_limit(&state, &ip_address)?;

    let name = req.name.trim();
    if name.is_empty() || name.len() > 120 {
        return Err(ApiError::Validation(
            "Name must be between 1 and 120 characters".to_string(),
        ));
    }

    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }

    validate_password(&req.password).map_err(|e| ApiError::Validation(e.to_string()))?;

    // Check if email already exists
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&state.pool)
        .await?;

    if exists {
        // Registration attempts count against the same per-IP budget as
        // failed logins, throttling mass account creation
        if let Some(ip) = &ip_address {
            state.rate_limiter.record_failure(ip);
        }
        return Err(ApiError::EmailAlreadyExists);
    }

    let password_hash = hash_password(&req.password).map_err(|_| ApiError::Internal)?;

    let user: UserSummaryRow = sqlx::query_as(
        r#"
        INSERT INTO users (name, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, email, role, avatar_url
        "#,
    )
    .bind(name)
    .bind(&email)
    .bind(&password_hash)
    .bind(req.role)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    let response = auth_response(
        &state,
        UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            avatar_url: user.avatar_url,
        },
    )?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Authenticate with email and password
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let ip_address = extract_client_ip(&headers);
    check_auth_rate_limit(&state, &ip_address)?;

    let email = req.email.trim().to_lowercase();

    let user: Option<UserAuthRow> = sqlx::query_as(
        r#"
        SELECT id, name, email, password_hash, role, auth_provider, avatar_url
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?;

    // OAuth-only accounts carry an impossible hash, so verification fails for
    // them the same way it does for a wrong password
    let verified = match &user {
        Some(user) => {
            verify_password(&req.password, &user.password_hash).map_err(|_| ApiError::Internal)?
        }
        None => {
            // Burn a comparable amount of time for unknown emails
            let _ = hash_password(&req.password);
            false
        }
    };

    if !verified {
        if let Some(ip) = &ip_address {
            state.rate_limiter.record_failure(ip);
        }
        return Err(ApiError::InvalidCredentials);
    }

    if let Some(ip) = &ip_address {
        state.rate_limiter.record_success(ip);
    }

    let user = user.ok_or(ApiError::InvalidCredentials)?;
    tracing::info!(user_id = %user.id, "User logged in");

    let response = auth_response(
        &state,
        UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            avatar_url: user.avatar_url,
        },
    )?;

    Ok(Json(response))
}

/// Login or sign up via a federated identity provider
///
/// The client completes the provider flow; this endpoint records the
/// identity and issues our own token. An existing credentials account is
/// relinked to the provider on first federated login.
pub async fn oauth_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OAuthLoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let ip_address = extract_client_ip(&headers);
    check_auth_rate_limit(&state, &ip_address)?;

    if !req.provider.is_federated() {
        return Err(ApiError::BadRequest(
            "Provider must be google or github".to_string(),
        ));
    }

    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }

    let existing: Option<UserAuthRow> = sqlx::query_as(
        r#"
        SELECT id, name, email, password_hash, role, auth_provider, avatar_url
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?;

    let user = match existing {
        Some(user) => {
            if user.auth_provider != req.provider {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET auth_provider = $2, provider_id = $3, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(user.id)
                .bind(req.provider)
                .bind(&req.provider_id)
                .execute(&state.pool)
                .await?;

                tracing::info!(
                    user_id = %user.id,
                    provider = %req.provider,
                    "Account relinked to federated provider"
                );
            }
            UserResponse {
                id: user.id,
                name: user.name,
                email: user.email,
                role: user.role,
                avatar_url: user.avatar_url,
            }
        }
        None => {
            let password_hash = generate_impossible_hash().map_err(|_| ApiError::Internal)?;

            let name = req.name.trim();
            if name.is_empty() {
                return Err(ApiError::Validation("Name is required".to_string()));
            }

            let user: UserSummaryRow = sqlx::query_as(
                r#"
                INSERT INTO users (name, email, password_hash, auth_provider, provider_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, name, email, role, avatar_url
                "#,
            )
            .bind(name)
            .bind(&email)
            .bind(&password_hash)
            .bind(req.provider)
            .bind(&req.provider_id)
            .fetch_one(&state.pool)
            .await?;

            tracing::info!(user_id = %user.id, provider = %req.provider, "Federated signup");

            UserResponse {
                id: user.id,
                name: user.name,
                email: user.email,
                role: user.role,
                avatar_url: user.avatar_url,
            }
        }
    };

    if let Some(ip) = &ip_address {
        state.rate_limiter.record_success(ip);
    }

    Ok(Json(auth_response(&state, user)?))
}

/// Current authenticated user
pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    let user: UserSummaryRow = sqlx::query_as(
        "SELECT id, name, email, role, avatar_url FROM users WHERE id = $1",
    )
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(UserResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        avatar_url: user.avatar_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user@domain."));
    }

    #[test]
    fn test_register_role_defaults_to_mentee() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"name":"Ada","email":"ada@example.com","password":"longenough"}"#,
        )
        .unwrap();
        assert_eq!(req.role, UserRole::Mentee);
    }

    #[test]
    fn test_oauth_request_parses_provider() {
        let req: OAuthLoginRequest = serde_json::from_str(
            r#"{"name":"Ada","email":"ada@example.com","provider":"google","provider_id":"g-123"}"#,
        )
        .unwrap();
        assert_eq!(req.provider, AuthProvider::Google);
    }
}
