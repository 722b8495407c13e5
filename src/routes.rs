//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{code}`          - Short link redirect (public, redirect limiter)
//! - `GET  /healthz`         - Liveness probe
//! - `GET  /readyz`          - Readiness probe: storage and click queue
//! - `/api/v1/auth/*`        - Register, login, refresh, logout (auth limiter)
//! - `/api/v1/links*`        - Link management (Bearer token required)
//!
//! # Middleware
//!
//! - **Request id** - `x-request-id` generated when absent, echoed on the response
//! - **CORS** - Any origin, the usual methods and headers
//! - **Tracing** - Structured request/response logging
//! - **Rate limiting** - Per-IP sliding window, one limiter per scope
//! - **Authentication** - Bearer access token
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::{liveness_handler, readiness_handler, redirect_handler};
use crate::api::middleware::rate_limit::{
    RateLimitGuard, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
use crate::api::middleware::{auth, rate_limit, tracing};
use crate::state::AppState;
use axum::http::{HeaderName, Method, header};
use axum::routing::get;
use axum::{Router, middleware};
use tower::Layer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Constructs the application router with all routes and middleware.
///
/// Rate limiting reads the client IP from proxy headers only when
/// `state.behind_proxy` is set.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state))
}

/// Routes and layers without path normalization, which has to wrap the
/// whole router from outside.
pub fn build_router(state: AppState) -> Router {
    let auth_guard = RateLimitGuard::new(state.auth_limiter.clone(), state.behind_proxy);
    let redirect_guard = RateLimitGuard::new(state.redirect_limiter.clone(), state.behind_proxy);

    let auth_router = api::routes::auth_routes()
        .layer(middleware::from_fn_with_state(auth_guard, rate_limit::layer));

    let links_router = api::routes::protected_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::layer));

    let api_router = Router::new()
        .nest("/auth", auth_router)
        .merge(links_router);

    let redirect_router = Router::new()
        .route("/{code}", get(redirect_handler))
        .route_layer(middleware::from_fn_with_state(
            redirect_guard,
            rate_limit::layer,
        ));

    Router::new()
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .nest("/api/v1", api_router)
        .merge(redirect_router)
        .with_state(state)
        .layer(cors_layer())
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(tracing::layer())
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .expose_headers([
            X_REQUEST_ID,
            X_RATELIMIT_LIMIT,
            X_RATELIMIT_REMAINING,
            X_RATELIMIT_RESET,
        ])
}
