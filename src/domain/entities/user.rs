//! User account entity.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A registered account.
///
/// `email` is always stored in normalized form (see [`normalize_email`]), which
/// makes the storage-side uniqueness constraint case-insensitive.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input data for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

/// Canonical form of an email address: surrounding whitespace removed, lowercased.
///
/// Registration and login must go through the same function, otherwise the
/// same mailbox could end up owning two accounts.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
