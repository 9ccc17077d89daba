//! Authentication module for MentorHub

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, JwtManager};
pub use middleware::{require_auth, AuthState, AuthUser};
pub use password::{generate_impossible_hash, hash_password, validate_password, verify_password};
