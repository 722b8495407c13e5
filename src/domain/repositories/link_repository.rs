//! Repository trait for short link data access.

use crate::domain::entities::{Link, LinkFilter, LinkPatch, NewLink};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository interface for managing short links.
///
/// Storage is the authority on short code uniqueness: [`create`](Self::create)
/// must reject a duplicate code even when the caller checked beforehand.
/// Every per-link call other than [`find_by_code`](Self::find_by_code) and
/// [`record_click`](Self::record_click) is scoped to the owning user.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLinkRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::memory::MemoryLinkRepository`] - In-process implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_link.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Creates a new short link.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the short code is already taken.
    /// Returns [`AppError::Internal`] on database errors.
    async fn create(&self, new_link: NewLink) -> Result<Link, AppError>;

    /// Finds a link by its short code, regardless of owner or state.
    async fn find_by_code(&self, code: &str) -> Result<Option<Link>, AppError>;

    /// Finds a link by id if it belongs to `user_id`.
    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Option<Link>, AppError>;

    /// Lists a user's links matching `filter`, ordered and paged by it.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: &LinkFilter,
    ) -> Result<Vec<Link>, AppError>;

    /// Counts a user's links matching `filter`, ignoring paging.
    async fn count_for_user(&self, user_id: Uuid, filter: &LinkFilter) -> Result<i64, AppError>;

    /// Applies `patch` and bumps `updated_at`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Link))` with the updated row
    /// - `Ok(None)` if the user owns no link with this id
    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: LinkPatch,
    ) -> Result<Option<Link>, AppError>;

    /// Hard-deletes a link, freeing its short code.
    ///
    /// Returns `Ok(false)` if the user owns no link with this id.
    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError>;

    /// Increments `click_count` and sets `last_clicked_at`.
    ///
    /// Returns `Ok(false)` if the code no longer exists.
    async fn record_click(&self, code: &str, clicked_at: DateTime<Utc>)
    -> Result<bool, AppError>;

    /// Counts all links. Doubles as the storage readiness probe.
    async fn count(&self) -> Result<i64, AppError>;
}
