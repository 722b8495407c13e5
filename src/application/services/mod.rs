//! Business logic services for the application layer.

pub mod auth_service;
pub mod code_allocator;
pub mod link_service;
pub mod session_service;

pub use auth_service::{AuthService, AuthSettings, AuthenticatedUser, RefreshedAccess, TokenPair};
pub use code_allocator::{AllocationError, ShortCodeAllocator};
pub use link_service::{CreateLink, LinkService};
pub use session_service::{IssuedRefreshToken, SessionError, SessionService};
