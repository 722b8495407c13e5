//! Application layer services implementing business logic.
//!
//! Services consume repository traits and the [`crate::security`] primitives
//! and provide a clean API for HTTP handlers and the admin CLI.
//!
//! # Available Services
//!
//! - [`services::auth_service::AuthService`] - Register, login, refresh, logout
//! - [`services::session_service::SessionService`] - Refresh token lifecycle
//! - [`services::code_allocator::ShortCodeAllocator`] - Unique short codes
//! - [`services::link_service::LinkService`] - Link CRUD and redirect resolution

pub mod services;
