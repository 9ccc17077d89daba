//! Presence registry
//!
//! Tracks which users currently have an open WebSocket connection and which
//! session to target for direct delivery. At most one entry per user: the
//! first connection wins and a later registration for the same user (a
//! second tab) is silently ignored, so only the first connection receives
//! direct notifications.
//!
//! The registry is a liveness optimization, not a correctness-critical
//! store: it is in-memory only and rebuilt from zero on process restart,
//! after which clients re-register on reconnect.

use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Mapping of online user IDs to their active connection session
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: RwLock<HashMap<Uuid, Uuid>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a user's connection
    ///
    /// Returns false (and leaves the existing entry untouched) when the user
    /// is already registered. Never an error.
    pub async fn register(&self, user_id: Uuid, session_id: Uuid) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&user_id) {
            tracing::debug!(
                user_id = %user_id,
                session_id = %session_id,
                "Duplicate presence registration ignored"
            );
            return false;
        }
        entries.insert(user_id, session_id);
        tracing::debug!(
            user_id = %user_id,
            session_id = %session_id,
            online_users = entries.len(),
            "User registered as online"
        );
        true
    }

    /// Look up the session for a user; absence means "deliver nothing"
    pub async fn lookup(&self, user_id: &Uuid) -> Option<Uuid> {
        let entries = self.entries.read().await;
        entries.get(user_id).copied()
    }

    /// Remove any entry held by the given session; idempotent
    pub async fn unregister(&self, session_id: &Uuid) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, session| session != session_id);
    }

    /// Number of users currently registered
    pub async fn online_count(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }
}
