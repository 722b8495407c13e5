//! Repository trait definitions for the domain layer.
//!
//! Traits define the contract for data operations. Implementations live in
//! `crate::infrastructure::persistence` (PostgreSQL) and
//! `crate::infrastructure::memory` (in-process). Mock implementations are
//! auto-generated via `mockall` for testing.
//!
//! # Available Repositories
//!
//! - [`UserRepository`] - User accounts
//! - [`LinkRepository`] - Short link CRUD and click counters
//! - [`RefreshTokenRepository`] - Refresh token records

pub mod link_repository;
pub mod refresh_token_repository;
pub mod user_repository;

pub use link_repository::LinkRepository;
pub use refresh_token_repository::RefreshTokenRepository;
pub use user_repository::UserRepository;

#[cfg(test)]
pub use link_repository::MockLinkRepository;
#[cfg(test)]
pub use refresh_token_repository::MockRefreshTokenRepository;
#[cfg(test)]
pub use user_repository::MockUserRepository;
