//! Repository trait for refresh token records.

use crate::domain::entities::{NewRefreshToken, RefreshToken};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository interface for refresh token records.
///
/// Records are addressed by token hash, which storage keeps unique. Every
/// mutating call is a single atomic statement, so concurrent callers never
/// observe a half-applied change.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgRefreshTokenRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::memory::MemoryRefreshTokenRepository`] - In-process implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_refresh_token.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Persists a new record with `revoked = false`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the hash already exists.
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshToken, AppError>;

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError>;

    /// Sets the revoked flag on the record with this hash.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if a record matched, whether or not it was already revoked
    /// - `Ok(false)` if no record has this hash
    async fn revoke(&self, token_hash: &str) -> Result<bool, AppError>;

    /// Atomically revokes the record if it is still live at `now`.
    ///
    /// Returns the record as it was before revocation, or `None` when no live
    /// record has this hash. Of two concurrent callers at most one gets `Some`.
    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, AppError>;

    /// Revokes every unrevoked record of a user. Returns how many changed.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;

    /// Deletes records whose expiry is before `now`. Returns how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}
