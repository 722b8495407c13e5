//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits using SQLx with
//! bound parameters. Uniqueness is enforced by named constraints from
//! `migrations/`.
//!
//! # Repositories
//!
//! - [`PgUserRepository`] - User accounts
//! - [`PgLinkRepository`] - Link storage, listing and click counters
//! - [`PgRefreshTokenRepository`] - Refresh token records

pub mod pg_link_repository;
pub mod pg_refresh_token_repository;
pub mod pg_user_repository;

pub use pg_link_repository::PgLinkRepository;
pub use pg_refresh_token_repository::PgRefreshTokenRepository;
pub use pg_user_repository::PgUserRepository;
