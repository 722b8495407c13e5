//! Refresh token record.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Persisted refresh token.
///
/// Only the hash of the opaque token is stored; the plaintext is handed to the
/// client once and never kept. Records are never updated except for the
/// `revoked` flag.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub revoked: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// True once `now` is strictly past `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Input data for persisting a refresh token.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}
