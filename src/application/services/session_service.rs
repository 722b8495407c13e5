//! Refresh token lifecycle: issue, validate, revoke, rotate, sweep.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{NewRefreshToken, RefreshToken};
use crate::domain::repositories::RefreshTokenRepository;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per refresh token (256 bits).
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Refresh token not found")]
    NotFound,

    #[error("Refresh token has been revoked")]
    Revoked,

    #[error("Refresh token has expired")]
    Expired,

    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    #[error(transparent)]
    Storage(#[from] AppError),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => AppError::not_found("Refresh token not found", json!({})),
            SessionError::Revoked | SessionError::Expired => {
                AppError::unauthorized(err.to_string(), json!({}))
            }
            SessionError::Entropy(_) => {
                tracing::error!(error = %err, "Refresh token generation failed");
                AppError::internal("Internal server error", json!({}))
            }
            SessionError::Storage(e) => e,
        }
    }
}

/// A freshly minted refresh token. The plaintext exists only here.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Stateful refresh tokens backed by a [`RefreshTokenRepository`].
///
/// Tokens are 32 random bytes, URL-safe base64 without padding. Storage only
/// ever sees `HMAC-SHA256(hash_secret, token)` in hex, so a leaked table
/// cannot be replayed and cannot be checked offline without the secret.
pub struct SessionService<R: RefreshTokenRepository + ?Sized> {
    repository: Arc<R>,
    hash_secret: String,
}

impl<R: RefreshTokenRepository + ?Sized> SessionService<R> {
    pub fn new(repository: Arc<R>, hash_secret: String) -> Self {
        Self {
            repository,
            hash_secret,
        }
    }

    /// Hashes a raw token with HMAC-SHA256 using the server secret.
    ///
    /// Returns a 64-character lowercase hex-encoded MAC.
    fn hash_token(&self, token: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.hash_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(token.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Mints and persists a refresh token for `user_id` valid for `ttl`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Entropy`] if the OS random source fails
    /// - [`SessionError::Storage`] if the record cannot be persisted
    pub async fn issue(
        &self,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<IssuedRefreshToken, SessionError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::fill(&mut bytes).map_err(|e| SessionError::Entropy(e.to_string()))?;
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let record = self
            .repository
            .create(NewRefreshToken {
                user_id,
                token_hash: self.hash_token(&token),
                expires_at: Utc::now() + ttl,
            })
            .await?;

        Ok(IssuedRefreshToken {
            token,
            expires_at: record.expires_at,
        })
    }

    /// Returns the owner of a live refresh token. Never rotates it.
    pub async fn validate(&self, token: &str) -> Result<Uuid, SessionError> {
        let record = self
            .repository
            .find_by_hash(&self.hash_token(token))
            .await?
            .ok_or(SessionError::NotFound)?;

        check_live(&record, Utc::now())?;

        Ok(record.user_id)
    }

    /// Marks the token revoked. Revoking twice is not an error.
    pub async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        if self.repository.revoke(&self.hash_token(token)).await? {
            Ok(())
        } else {
            Err(SessionError::NotFound)
        }
    }

    /// Revokes every unrevoked token of a user. Returns how many were revoked.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, SessionError> {
        let revoked = self.repository.revoke_all_for_user(user_id).await?;

        tracing::info!(%user_id, revoked, "Revoked all sessions for user");

        Ok(revoked)
    }

    /// Exchanges a live token for a new one, revoking the old.
    ///
    /// The old record is consumed atomically, so two concurrent rotations of
    /// the same token cannot both succeed.
    ///
    /// The owner is only known once the old record is consumed, so the new
    /// token is issued afterwards. If that insert fails the presented token
    /// is already revoked and the caller gets [`SessionError::Storage`]
    /// without a usable session; the client has to log in again.
    pub async fn rotate(
        &self,
        token: &str,
        ttl: Duration,
    ) -> Result<(Uuid, IssuedRefreshToken), SessionError> {
        let hash = self.hash_token(token);
        let now = Utc::now();

        let Some(consumed) = self.repository.consume(&hash, now).await? else {
            let record = self
                .repository
                .find_by_hash(&hash)
                .await?
                .ok_or(SessionError::NotFound)?;
            check_live(&record, now)?;

            // The record changed between the two reads.
            return Err(SessionError::Revoked);
        };

        let issued = self.issue(consumed.user_id, ttl).await?;

        Ok((consumed.user_id, issued))
    }

    /// Deletes every record past its expiry. Returns how many were removed.
    pub async fn sweep_expired(&self) -> Result<u64, SessionError> {
        let removed = self.repository.delete_expired(Utc::now()).await?;

        metrics::counter!("sessions_swept_total").increment(removed);
        if removed > 0 {
            tracing::info!(removed, "Expired refresh tokens swept");
        }

        Ok(removed)
    }
}

/// Revocation wins over expiry when both apply.
fn check_live(record: &RefreshToken, now: DateTime<Utc>) -> Result<(), SessionError> {
    if record.revoked {
        return Err(SessionError::Revoked);
    }

    if record.is_expired_at(now) {
        return Err(SessionError::Expired);
    }

    Ok(())
}
