//! Access token guard for the link management routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBearer;
use serde_json::json;

use crate::{error::AppError, state::AppState};

/// Resolves the caller from `Authorization: Bearer <access token>`.
///
/// Verification is stateless: signature and expiry only, no storage lookup.
/// On success the [`AuthenticatedUser`](crate::application::services::AuthenticatedUser)
/// is stored in request extensions for handlers to pick up with
/// `Extension<AuthenticatedUser>`.
///
/// A missing or malformed header and a bad token all answer `401` with
/// `WWW-Authenticate: Bearer`.
///
/// ```rust,ignore
/// let links = Router::new()
///     .route("/links", get(list_links_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth::layer));
/// ```
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let AuthBearer(token) = AuthBearer::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| {
            AppError::unauthorized(
                "Missing bearer token",
                json!({ "header": "Authorization" }),
            )
        })?;

    let user = st.auth_service.authenticate(&token)?;
    tracing::debug!(user_id = %user.id, "Request authenticated");

    parts.extensions.insert(user);

    Ok(next.run(Request::from_parts(parts, body)).await)
}
