//! Link entity representing a shortened URL owned by a user.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A shortened URL with its owner and click counters.
#[derive(Debug, Clone)]
pub struct Link {
    pub id: Uuid,
    pub user_id: Uuid,
    pub short_code: String,
    pub target_url: String,
    pub title: Option<String>,
    pub is_active: bool,
    pub click_count: i64,
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input data for creating a new link.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub user_id: Uuid,
    pub short_code: String,
    pub target_url: String,
    pub title: Option<String>,
    pub is_active: bool,
}

/// Partial update for an existing link.
///
/// `None` fields are left unchanged. The short code is immutable.
#[derive(Debug, Clone, Default)]
pub struct LinkPatch {
    pub target_url: Option<String>,
    pub title: Option<String>,
    pub is_active: Option<bool>,
}

impl LinkPatch {
    pub fn is_empty(&self) -> bool {
        self.target_url.is_none() && self.title.is_none() && self.is_active.is_none()
    }
}

/// Column a link listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    ShortCode,
    ClickCount,
    LastClickedAt,
}

impl SortField {
    pub const ALLOWED: &'static str =
        "created_at, updated_at, title, short_code, click_count, last_clicked_at";

    /// Column name; only ever one of a fixed set, safe to splice into SQL.
    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title",
            SortField::ShortCode => "short_code",
            SortField::ClickCount => "click_count",
            SortField::LastClickedAt => "last_clicked_at",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "title" => Ok(SortField::Title),
            "short_code" => Ok(SortField::ShortCode),
            "click_count" => Ok(SortField::ClickCount),
            "last_clicked_at" => Ok(SortField::LastClickedAt),
            other => Err(format!(
                "Invalid sort_by field '{other}'. Allowed values: {}",
                Self::ALLOWED
            )),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!(
                "Invalid order_by value '{other}'. Allowed values: asc, desc"
            )),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Filtering, ordering and paging for a user's link listing.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    pub limit: i64,
    pub offset: i64,
    /// Case-insensitive substring matched against short code and title.
    pub query: Option<String>,
    pub active: Option<bool>,
    pub sort_by: SortField,
    pub order: SortOrder,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            query: None,
            active: None,
            sort_by: SortField::default(),
            order: SortOrder::default(),
        }
    }
}
