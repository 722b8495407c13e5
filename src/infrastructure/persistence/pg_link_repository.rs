//! PostgreSQL implementation of link repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::entities::{Link, LinkFilter, LinkPatch, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;

const LINK_COLUMNS: &str = "id, user_id, short_code, target_url, title, is_active, \
                            click_count, last_clicked_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: Uuid,
    user_id: Uuid,
    short_code: String,
    target_url: String,
    title: Option<String>,
    is_active: bool,
    click_count: i64,
    last_clicked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            short_code: row.short_code,
            target_url: row.target_url,
            title: row.title,
            is_active: row.is_active,
            click_count: row.click_count,
            last_clicked_at: row.last_clicked_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escapes `LIKE` metacharacters so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, user_id: Uuid, filter: &LinkFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);

    if let Some(active) = filter.active {
        qb.push(" AND is_active = ").push_bind(active);
    }

    if let Some(query) = &filter.query {
        let pattern = format!("%{}%", escape_like(query));
        qb.push(" AND (short_code ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR title ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// PostgreSQL repository for link storage and retrieval.
///
/// Short code uniqueness is the `links_short_code_key` constraint; a
/// violation surfaces as [`AppError::Conflict`] through the `sqlx::Error`
/// conversion.
pub struct PgLinkRepository {
    pool: Arc<PgPool>,
}

impl PgLinkRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn create(&self, new_link: NewLink) -> Result<Link, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            r#"
            INSERT INTO links (id, user_id, short_code, target_url, title, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new_link.user_id)
        .bind(&new_link.short_code)
        .bind(&new_link.target_url)
        .bind(&new_link.title)
        .bind(new_link.is_active)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Link>, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE short_code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Option<Link>, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: &LinkFilter,
    ) -> Result<Vec<Link>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {LINK_COLUMNS} FROM links"));
        push_filters(&mut qb, user_id, filter);

        let direction = filter.order.keyword();
        qb.push(format!(
            " ORDER BY {} {direction}, id {direction}",
            filter.sort_by.column()
        ));
        qb.push(" LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = qb
            .build_query_as::<LinkRow>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_for_user(&self, user_id: Uuid, filter: &LinkFilter) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM links");
        push_filters(&mut qb, user_id, filter);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: LinkPatch,
    ) -> Result<Option<Link>, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            r#"
            UPDATE links
            SET target_url = COALESCE($3, target_url),
                title = COALESCE($4, title),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(patch.target_url)
        .bind(patch.title)
        .bind(patch.is_active)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM links WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_click(&self, code: &str, clicked_at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE links
            SET click_count = click_count + 1,
                last_clicked_at = $2
            WHERE short_code = $1
            "#,
        )
        .bind(code)
        .bind(clicked_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
