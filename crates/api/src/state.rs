//! Shared application state

use std::sync::Arc;

use mentorhub_shared::AuthRateLimiter;
use sqlx::PgPool;

use crate::{
    auth::{AuthState, JwtManager},
    config::Config,
    storage::AvatarStorage,
    summarizer::SessionSummarizer,
    websocket::WebSocketState,
};

/// State shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt_manager: JwtManager,
    pub rate_limiter: Arc<AuthRateLimiter>,
    pub ws_state: WebSocketState,
    pub avatar_storage: AvatarStorage,
    pub summarizer: SessionSummarizer,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
        let avatar_storage = AvatarStorage::new(&config);
        let summarizer = SessionSummarizer::new(&config);

        Self {
            pool,
            config: Arc::new(config),
            jwt_manager,
            rate_limiter: Arc::new(AuthRateLimiter::default()),
            ws_state: WebSocketState::new(),
            avatar_storage,
            summarizer,
        }
    }

    /// State subset needed by the auth middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            pool: self.pool.clone(),
            jwt_manager: self.jwt_manager.clone(),
        }
    }
}
