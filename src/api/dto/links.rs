//! DTOs for link management endpoints.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::{NoneAsEmptyString, serde_as};
use std::sync::LazyLock;
use uuid::Uuid;
use validator::Validate;

use crate::domain::entities::{Link, LinkFilter, LinkPatch, SortField, SortOrder};
use crate::error::AppError;

/// Compiled regex for caller-chosen short codes.
static SHORT_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLinkRequest {
    #[validate(url(message = "Invalid URL format"))]
    #[validate(length(max = 2048))]
    pub target_url: String,

    #[validate(length(min = 4, max = 32))]
    #[validate(regex(path = "*SHORT_CODE_REGEX"))]
    pub short_code: Option<String>,

    #[validate(length(max = 255))]
    pub title: Option<String>,

    pub is_active: Option<bool>,
}

/// Partial update. Omitted fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLinkRequest {
    #[validate(url(message = "Invalid URL format"))]
    #[validate(length(max = 2048))]
    pub target_url: Option<String>,

    #[validate(length(max = 255))]
    pub title: Option<String>,

    pub is_active: Option<bool>,
}

impl From<UpdateLinkRequest> for LinkPatch {
    fn from(req: UpdateLinkRequest) -> Self {
        Self {
            target_url: req.target_url,
            title: req.title,
            is_active: req.is_active,
        }
    }
}

/// Query string of `GET /api/v1/links`.
///
/// `limit` and `offset` are lenient: anything unparsable or out of range
/// falls back to the default. `sort_by` and `order_by` are strict.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct ListLinksQuery {
    #[serde(default)]
    pub limit: Option<String>,

    #[serde(default)]
    pub offset: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub active: Option<String>,

    #[serde(default)]
    pub sort_by: Option<String>,

    #[serde(default)]
    pub order_by: Option<String>,
}

impl ListLinksQuery {
    /// Converts the raw parameters into a repository filter.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an unknown `sort_by` or `order_by`.
    pub fn into_filter(self) -> Result<LinkFilter, AppError> {
        let defaults = LinkFilter::default();

        let limit = self
            .limit
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| (1..=MAX_PAGE_SIZE).contains(v))
            .unwrap_or(defaults.limit);

        let offset = self
            .offset
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .unwrap_or(defaults.offset);

        let active = match self.active.as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        };

        let sort_by = match self.sort_by.as_deref() {
            Some(raw) => raw.parse::<SortField>().map_err(|message| {
                AppError::bad_request(message, json!({ "field": "sort_by" }))
            })?,
            None => defaults.sort_by,
        };

        let order = match self.order_by.as_deref() {
            Some(raw) => raw.parse::<SortOrder>().map_err(|message| {
                AppError::bad_request(message, json!({ "field": "order_by" }))
            })?,
            None => defaults.order,
        };

        Ok(LinkFilter {
            limit,
            offset,
            query: self.query.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
            active,
            sort_by,
            order,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub id: Uuid,
    pub short_code: String,
    pub short_url: String,
    pub target_url: String,
    pub title: Option<String>,
    pub is_active: bool,
    pub click_count: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_clicked_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LinkResponse {
    pub fn new(link: Link, short_url: String) -> Self {
        Self {
            id: link.id,
            short_code: link.short_code,
            short_url,
            target_url: link.target_url,
            title: link.title,
            is_active: link.is_active,
            click_count: link.click_count,
            last_clicked_at: link.last_clicked_at,
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LinkListResponse {
    pub links: Vec<LinkResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
