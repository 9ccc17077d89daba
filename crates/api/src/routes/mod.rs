//! API routes

pub mod ai;
pub mod auth;
pub mod bookings;
pub mod chat;
pub mod health;
pub mod reviews;
pub mod uploads;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, HeaderValue, Method,
    },
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::require_auth, state::AppState, websocket::ws_handler};

/// Extract client IP address from request headers.
/// Checks common proxy headers in order of preference.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("cf-connecting-ip") // Cloudflare
        .or_else(|| headers.get("x-real-ip"))
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|h| h.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public API routes (no auth required) - under /api/v1
    let public_api_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/oauth", post(auth::oauth_login))
        // Mentor reviews are public marketing surface
        .route("/reviews/mentor/:mentor_id", get(reviews::list_mentor_reviews));

    // Protected API routes (auth required) - under /api/v1
    let protected_api_routes = Router::new()
        // Auth routes
        .route("/auth/me", get(auth::me))
        // Profile routes
        .route("/users/profile", get(users::get_profile))
        .route("/users/profile", put(users::update_profile))
        // Mentor discovery
        .route("/users/mentors", get(users::list_mentors))
        .route("/users/mentors/:mentor_id", get(users::get_mentor))
        // Booking lifecycle
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings", get(bookings::list_my_bookings))
        .route("/bookings/:booking_id", put(bookings::update_booking_status))
        // Chat history
        .route("/chat/:booking_id", get(chat::get_messages))
        // Reviews
        .route("/reviews", post(reviews::create_review))
        // Avatar upload
        .route("/uploads/avatar", post(uploads::upload_avatar))
        // AI summarization
        .route("/ai/summarize", post(ai::summarize))
        .layer(middleware::from_fn_with_state(auth_state, require_auth));

    // WebSocket routes (auth handled in handler via query parameter)
    let websocket_routes = Router::new().route("/ws", get(ws_handler));

    // Combine API routes under /api/v1 prefix
    let api_v1_routes = Router::new()
        .merge(public_api_routes)
        .merge(protected_api_routes)
        .merge(websocket_routes);

    let allow_origin = state
        .config
        .client_origin
        .parse::<HeaderValue>()
        .map(AllowOrigin::exact)
        .unwrap_or_else(|_| AllowOrigin::any());

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Global request body size limit; comfortably above the avatar cap
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state)
}
