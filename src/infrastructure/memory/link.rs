use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::unique_violation;
use crate::domain::entities::{Link, LinkFilter, LinkPatch, NewLink, SortField, SortOrder};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;

#[derive(Default)]
struct Tables {
    links: HashMap<Uuid, Link>,
    by_code: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryLinkRepository {
    tables: RwLock<Tables>,
}

impl MemoryLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching<'a>(
        tables: &'a Tables,
        user_id: Uuid,
        filter: &LinkFilter,
    ) -> impl Iterator<Item = &'a Link> {
        let query = filter.query.as_ref().map(|q| q.to_lowercase());
        let active = filter.active;

        tables.links.values().filter(move |link| {
            link.user_id == user_id
                && active.is_none_or(|a| link.is_active == a)
                && query.as_ref().is_none_or(|q| {
                    link.short_code.to_lowercase().contains(q.as_str())
                        || link
                            .title
                            .as_ref()
                            .is_some_and(|t| t.to_lowercase().contains(q.as_str()))
                })
        })
    }
}

/// Ascending order with NULLs last, matching PostgreSQL's default.
fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare(a: &Link, b: &Link, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Title => nulls_last(&a.title, &b.title),
        SortField::ShortCode => a.short_code.cmp(&b.short_code),
        SortField::ClickCount => a.click_count.cmp(&b.click_count),
        SortField::LastClickedAt => nulls_last(&a.last_clicked_at, &b.last_clicked_at),
    }
}

#[async_trait]
impl LinkRepository for MemoryLinkRepository {
    async fn create(&self, new_link: NewLink) -> Result<Link, AppError> {
        let mut tables = self.tables.write().await;

        if tables.by_code.contains_key(&new_link.short_code) {
            return Err(unique_violation("links_short_code_key"));
        }

        let now = Utc::now();
        let link = Link {
            id: Uuid::new_v4(),
            user_id: new_link.user_id,
            short_code: new_link.short_code,
            target_url: new_link.target_url,
            title: new_link.title,
            is_active: new_link.is_active,
            click_count: 0,
            last_clicked_at: None,
            created_at: now,
            updated_at: now,
        };

        tables.by_code.insert(link.short_code.clone(), link.id);
        tables.links.insert(link.id, link.clone());

        Ok(link)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Link>, AppError> {
        let tables = self.tables.read().await;

        Ok(tables
            .by_code
            .get(code)
            .and_then(|id| tables.links.get(id))
            .cloned())
    }

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Option<Link>, AppError> {
        let tables = self.tables.read().await;

        Ok(tables
            .links
            .get(&id)
            .filter(|link| link.user_id == user_id)
            .cloned())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: &LinkFilter,
    ) -> Result<Vec<Link>, AppError> {
        let tables = self.tables.read().await;

        let mut links: Vec<Link> = Self::matching(&tables, user_id, filter).cloned().collect();
        links.sort_by(|a, b| {
            let ord = compare(a, b, filter.sort_by).then_with(|| a.id.cmp(&b.id));
            match filter.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        Ok(links
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(0))
            .take(usize::try_from(filter.limit).unwrap_or(0))
            .collect())
    }

    async fn count_for_user(&self, user_id: Uuid, filter: &LinkFilter) -> Result<i64, AppError> {
        let tables = self.tables.read().await;
        Ok(Self::matching(&tables, user_id, filter).count() as i64)
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: LinkPatch,
    ) -> Result<Option<Link>, AppError> {
        let mut tables = self.tables.write().await;

        let Some(link) = tables
            .links
            .get_mut(&id)
            .filter(|link| link.user_id == user_id)
        else {
            return Ok(None);
        };

        if let Some(target_url) = patch.target_url {
            link.target_url = target_url;
        }
        if let Some(title) = patch.title {
            link.title = Some(title);
        }
        if let Some(is_active) = patch.is_active {
            link.is_active = is_active;
        }
        link.updated_at = Utc::now();

        Ok(Some(link.clone()))
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;

        let owned = tables
            .links
            .get(&id)
            .is_some_and(|link| link.user_id == user_id);
        if !owned {
            return Ok(false);
        }

        if let Some(link) = tables.links.remove(&id) {
            tables.by_code.remove(&link.short_code);
        }

        Ok(true)
    }

    async fn record_click(&self, code: &str, clicked_at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;

        let Some(id) = tables.by_code.get(code).copied() else {
            return Ok(false);
        };

        Ok(match tables.links.get_mut(&id) {
            Some(link) => {
                link.click_count += 1;
                link.last_clicked_at = Some(clicked_at);
                true
            }
            None => false,
        })
    }

    async fn count(&self) -> Result<i64, AppError> {
        Ok(self.tables.read().await.links.len() as i64)
    }
}
