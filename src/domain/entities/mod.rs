//! Core domain entities.
//!
//! Entities are plain data structures. Creation inputs live next to them as
//! `New*` structs, partial updates as `*Patch`.
//!
//! - [`User`] - A registered account
//! - [`Link`] - A short code owned by a user
//! - [`RefreshToken`] - A stored refresh-token hash

pub mod link;
pub mod refresh_token;
pub mod user;

pub use link::{Link, LinkFilter, LinkPatch, NewLink, SortField, SortOrder};
pub use refresh_token::{NewRefreshToken, RefreshToken};
pub use user::{NewUser, User, normalize_email};
