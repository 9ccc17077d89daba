//! In-memory rate limiting for authentication endpoints
//!
//! Tracks failed attempts per client key (IP address) and locks the key out
//! after too many failures. State is process-local and resets on restart,
//! which is acceptable for an abuse brake rather than a billing meter.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Failed attempts allowed before lockout
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Lockout duration once the attempt budget is exhausted
const DEFAULT_LOCKOUT: Duration = Duration::from_secs(5 * 60);

/// Window after which a stale failure count is forgotten
const DEFAULT_RESET_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Locked out; retry after the contained number of seconds
    Blocked { retry_after_seconds: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Debug)]
struct AttemptEntry {
    failures: u32,
    last_failure: Instant,
    locked_until: Option<Instant>,
}

/// Rate limiter for login/registration attempts, keyed by client IP
#[derive(Debug)]
pub struct AuthRateLimiter {
    attempts: Mutex<HashMap<String, AttemptEntry>>,
    max_attempts: u32,
    lockout: Duration,
    reset_window: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT)
    }
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_attempts,
            lockout,
            reset_window: DEFAULT_RESET_WINDOW,
        }
    }

    /// Check whether the key may attempt authentication right now
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        if let Some(entry) = attempts.get_mut(key) {
            if let Some(until) = entry.locked_until {
                if now < until {
                    return RateLimitDecision::Blocked {
                        retry_after_seconds: (until - now).as_secs().max(1),
                    };
                }
                // Lockout expired; start over
                entry.failures = 0;
                entry.locked_until = None;
            } else if now.duration_since(entry.last_failure) > self.reset_window {
                entry.failures = 0;
            }
        }

        RateLimitDecision::Allowed
    }

    /// Record a failed attempt, locking the key out once the budget is spent
    pub fn record_failure(&self, key: &str) {
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        let entry = attempts.entry(key.to_string()).or_insert(AttemptEntry {
            failures: 0,
            last_failure: now,
            locked_until: None,
        });

        if now.duration_since(entry.last_failure) > self.reset_window {
            entry.failures = 0;
        }

        entry.failures += 1;
        entry.last_failure = now;

        if entry.failures >= self.max_attempts {
            entry.locked_until = Some(now + self.lockout);
            tracing::warn!(key = %key, failures = entry.failures, "Auth rate limit lockout");
        }
    }

    /// Clear the key's failure history after a successful authentication
    pub fn record_success(&self, key: &str) {
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        attempts.remove(key);
    }

    /// Drop entries that can no longer influence a decision
    pub fn cleanup(&self) {
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        let reset_window = self.reset_window;
        attempts.retain(|_, entry| {
            if let Some(until) = entry.locked_until {
                return now < until;
            }
            now.duration_since(entry.last_failure) < reset_window
        });
    }
}
