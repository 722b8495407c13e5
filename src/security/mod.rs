//! Credential primitives and admission control.
//!
//! - [`password::PasswordHasher`] - Argon2id password digests
//! - [`jwt::TokenIssuer`] - HS256 access tokens
//! - [`rate_limit::RateLimiter`] - Sliding-window limiter keyed by caller

pub mod jwt;
pub mod password;
pub mod rate_limit;

pub use jwt::{Claims, TokenError, TokenIssuer, VerifiedToken};
pub use password::{PasswordError, PasswordHasher};
pub use rate_limit::{Decision, RateLimiter};
