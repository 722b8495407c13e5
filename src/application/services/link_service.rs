//! Link management and redirect resolution.

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::services::code_allocator::ShortCodeAllocator;
use crate::domain::entities::{Link, LinkFilter, LinkPatch, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::utils::target_url::check_target_url;

/// Input for [`LinkService::create`].
#[derive(Debug, Clone)]
pub struct CreateLink {
    pub target_url: String,
    pub title: Option<String>,
    pub short_code: Option<String>,
    pub is_active: Option<bool>,
}

/// Service for a user's links and for public code resolution.
pub struct LinkService<L: LinkRepository + ?Sized> {
    repository: Arc<L>,
    allocator: ShortCodeAllocator<L>,
    base_url: String,
}

impl<L: LinkRepository + ?Sized> LinkService<L> {
    pub fn new(repository: Arc<L>, base_url: impl Into<String>) -> Self {
        Self {
            allocator: ShortCodeAllocator::new(Arc::clone(&repository)),
            repository,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a link owned by `user_id`.
    ///
    /// Without a caller short code one is generated; the insert itself decides
    /// uniqueness and a lost race is retried with a new code.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for a bad URL or a malformed/reserved code
    /// - [`AppError::Conflict`] if the requested code is taken
    /// - [`AppError::Exhausted`] if no free code was found
    pub async fn create(&self, user_id: Uuid, input: CreateLink) -> Result<Link, AppError> {
        check_target_url(&input.target_url).map_err(|e| {
            AppError::bad_request(
                "Invalid URL format",
                json!({ "field": "target_url", "reason": e.to_string() }),
            )
        })?;

        let candidate = input.short_code.as_deref();

        let link = self
            .allocator
            .allocate_with(candidate, |short_code| {
                self.repository.create(NewLink {
                    user_id,
                    short_code,
                    target_url: input.target_url.clone(),
                    title: input.title.clone(),
                    is_active: input.is_active.unwrap_or(true),
                })
            })
            .await?;

        tracing::info!(link_id = %link.id, code = %link.short_code, "Link created");

        Ok(link)
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Link, AppError> {
        self.repository
            .find_for_user(id, user_id)
            .await?
            .ok_or_else(|| link_not_found(id))
    }

    /// Returns one page of the user's links and the total matching count.
    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &LinkFilter,
    ) -> Result<(Vec<Link>, i64), AppError> {
        let links = self.repository.list_for_user(user_id, filter).await?;
        let total = self.repository.count_for_user(user_id, filter).await?;

        Ok((links, total))
    }

    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an empty patch or a bad URL and
    /// [`AppError::NotFound`] if the user owns no such link.
    pub async fn update(&self, user_id: Uuid, id: Uuid, patch: LinkPatch) -> Result<Link, AppError> {
        if patch.is_empty() {
            return Err(AppError::bad_request(
                "At least one field must be provided",
                json!({ "fields": ["target_url", "title", "is_active"] }),
            ));
        }

        if let Some(url) = &patch.target_url {
            check_target_url(url).map_err(|e| {
                AppError::bad_request(
                    "Invalid URL format",
                    json!({ "field": "target_url", "reason": e.to_string() }),
                )
            })?;
        }

        self.repository
            .update(id, user_id, patch)
            .await?
            .ok_or_else(|| link_not_found(id))
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        if self.repository.delete(id, user_id).await? {
            tracing::info!(link_id = %id, "Link deleted");
            Ok(())
        } else {
            Err(link_not_found(id))
        }
    }

    /// Looks up the link a public short code points to.
    ///
    /// Unknown and deactivated codes both answer [`AppError::NotFound`].
    pub async fn resolve(&self, code: &str) -> Result<Link, AppError> {
        match self.repository.find_by_code(code).await? {
            Some(link) if link.is_active => Ok(link),
            _ => Err(AppError::not_found(
                "Short link not found",
                json!({ "code": code }),
            )),
        }
    }

    /// Storage probe for readiness checks.
    pub async fn count(&self) -> Result<i64, AppError> {
        self.repository.count().await
    }

    /// Public URL for a short code.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }
}

fn link_not_found(id: Uuid) -> AppError {
    AppError::not_found("Link not found", json!({ "id": id }))
}
