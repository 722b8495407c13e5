//! API route configuration.
//!
//! Mounted under `/api/v1` by [`crate::routes::app_router`], which also
//! attaches the rate limiter and bearer authentication.

use crate::api::handlers::{
    create_link_handler, delete_link_handler, get_link_handler, list_links_handler,
    login_handler, logout_handler, refresh_handler, register_handler, update_link_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Credential endpoints, public but rate limited per client IP.
///
/// # Endpoints
///
/// - `POST /register` - Create an account
/// - `POST /login`    - Exchange credentials for an access and refresh token
/// - `POST /refresh`  - Mint a new access token
/// - `POST /logout`   - Revoke a refresh token
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/refresh", post(refresh_handler))
        .route("/logout", post(logout_handler))
}

/// Link management routes, protected by Bearer token authentication.
///
/// # Endpoints
///
/// - `GET    /links`       - List the caller's links (filter, sort, page)
/// - `POST   /links`       - Create a short link
/// - `GET    /links/{id}`  - Fetch one link
/// - `PATCH  /links/{id}`  - Partially update a link
/// - `DELETE /links/{id}`  - Delete a link
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/links", get(list_links_handler).post(create_link_handler))
        .route(
            "/links/{id}",
            get(get_link_handler)
                .patch(update_link_handler)
                .delete(delete_link_handler),
        )
}
