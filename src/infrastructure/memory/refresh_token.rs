use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::unique_violation;
use crate::domain::entities::{NewRefreshToken, RefreshToken};
use crate::domain::repositories::RefreshTokenRepository;
use crate::error::AppError;

/// Records keyed by token hash.
#[derive(Default)]
pub struct MemoryRefreshTokenRepository {
    tokens: RwLock<HashMap<String, RefreshToken>>,
}

impl MemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryRefreshTokenRepository {
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshToken, AppError> {
        let mut tokens = self.tokens.write().await;

        if tokens.contains_key(&token.token_hash) {
            return Err(unique_violation("refresh_tokens_token_hash_key"));
        }

        let record = RefreshToken {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            token_hash: token.token_hash,
            revoked: false,
            expires_at: token.expires_at,
            created_at: Utc::now(),
        };
        tokens.insert(record.token_hash.clone(), record.clone());

        Ok(record)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError> {
        Ok(self.tokens.read().await.get(token_hash).cloned())
    }

    async fn revoke(&self, token_hash: &str) -> Result<bool, AppError> {
        let mut tokens = self.tokens.write().await;

        Ok(match tokens.get_mut(token_hash) {
            Some(record) => {
                record.revoked = true;
                true
            }
            None => false,
        })
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, AppError> {
        let mut tokens = self.tokens.write().await;

        match tokens.get_mut(token_hash) {
            Some(record) if !record.revoked && !record.is_expired_at(now) => {
                let before = record.clone();
                record.revoked = true;
                Ok(Some(before))
            }
            _ => Ok(None),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut tokens = self.tokens.write().await;

        let mut revoked = 0;
        for record in tokens.values_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                revoked += 1;
            }
        }

        Ok(revoked)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tokens = self.tokens.write().await;

        let before = tokens.len();
        tokens.retain(|_, record| record.expires_at >= now);

        Ok((before - tokens.len()) as u64)
    }
}
