//! MentorHub API Library
//!
//! This crate contains the API server components for MentorHub.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod storage;
pub mod summarizer;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
