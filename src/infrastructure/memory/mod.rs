//! In-process repository implementations.
//!
//! Each repository keeps its rows behind a `tokio::sync::RwLock` and enforces
//! the same uniqueness constraints as the PostgreSQL schema, reporting
//! violations as [`AppError::Conflict`](crate::error::AppError::Conflict)
//! with the constraint name. State lives only as long as the process.

mod link;
mod refresh_token;
mod user;

pub use link::MemoryLinkRepository;
pub use refresh_token::MemoryRefreshTokenRepository;
pub use user::MemoryUserRepository;

use crate::error::AppError;
use serde_json::json;

fn unique_violation(constraint: &str) -> AppError {
    AppError::conflict(
        "Unique constraint violation",
        json!({ "constraint": constraint }),
    )
}
