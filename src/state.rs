//! Shared application state injected into every handler.

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::application::services::{AuthService, AuthSettings, LinkService, SessionService};
use crate::config::Config;
use crate::domain::click_event::ClickEvent;
use crate::domain::repositories::{LinkRepository, RefreshTokenRepository, UserRepository};
use crate::infrastructure::memory::{
    MemoryLinkRepository, MemoryRefreshTokenRepository, MemoryUserRepository,
};
use crate::infrastructure::persistence::{
    PgLinkRepository, PgRefreshTokenRepository, PgUserRepository,
};
use crate::security::{RateLimiter, TokenIssuer};

pub type DynAuthService = AuthService<dyn UserRepository, dyn RefreshTokenRepository>;
pub type DynSessionService = SessionService<dyn RefreshTokenRepository>;
pub type DynLinkService = LinkService<dyn LinkRepository>;

/// The storage backend behind the services.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub links: Arc<dyn LinkRepository>,
}

impl Repositories {
    pub fn postgres(pool: Arc<PgPool>) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenRepository::new(pool.clone())),
            links: Arc::new(PgLinkRepository::new(pool)),
        }
    }

    pub fn memory() -> Self {
        Self {
            users: Arc::new(MemoryUserRepository::new()),
            refresh_tokens: Arc::new(MemoryRefreshTokenRepository::new()),
            links: Arc::new(MemoryLinkRepository::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<DynAuthService>,
    pub sessions: Arc<DynSessionService>,
    pub link_service: Arc<DynLinkService>,
    pub auth_limiter: Arc<RateLimiter>,
    pub redirect_limiter: Arc<RateLimiter>,
    pub click_sender: mpsc::Sender<ClickEvent>,
    /// Take the client IP from proxy headers when rate limiting.
    pub behind_proxy: bool,
}

impl AppState {
    /// Wires the services over `repositories` using the configured secrets,
    /// lifetimes and limits.
    pub fn new(
        repositories: &Repositories,
        config: &Config,
        click_sender: mpsc::Sender<ClickEvent>,
    ) -> Self {
        let sessions = Arc::new(SessionService::new(
            repositories.refresh_tokens.clone(),
            config.token_hash_secret.clone(),
        ));
        let tokens = Arc::new(TokenIssuer::new(config.jwt_secret.as_bytes()));

        let settings = AuthSettings {
            access_ttl: chrono::Duration::seconds(config.access_ttl_seconds),
            refresh_ttl: chrono::Duration::seconds(config.refresh_ttl_seconds),
            rotate_refresh_tokens: config.refresh_token_rotation,
        };

        let auth_service = Arc::new(AuthService::new(
            repositories.users.clone(),
            sessions.clone(),
            tokens,
            settings,
        ));
        let link_service = Arc::new(LinkService::new(
            repositories.links.clone(),
            config.base_url.clone(),
        ));

        let window = Duration::from_secs(config.rate_limit_window_seconds);

        Self {
            auth_service,
            sessions,
            link_service,
            auth_limiter: Arc::new(RateLimiter::new("auth", config.rate_limit_auth, window)),
            redirect_limiter: Arc::new(RateLimiter::new(
                "redirect",
                config.rate_limit_redirect,
                window,
            )),
            click_sender,
            behind_proxy: config.behind_proxy,
        }
    }
}
