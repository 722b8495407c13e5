//! Handlers for link management endpoints.
//!
//! Every handler runs behind [`crate::api::middleware::auth`] and only ever
//! touches links owned by the authenticated user. Foreign ids answer 404.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::api::dto::links::{
    CreateLinkRequest, LinkListResponse, LinkResponse, ListLinksQuery, UpdateLinkRequest,
};
use crate::api::extract::{AppJson, AppPath, AppQuery};
use crate::application::services::{AuthenticatedUser, CreateLink};
use crate::domain::entities::Link;
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short link.
///
/// # Endpoint
///
/// `POST /api/v1/links`
///
/// # Request Body
///
/// ```json
/// {
///   "target_url": "https://example.com/some/page",
///   "short_code": "my-link",  // optional, 4-32 of [A-Za-z0-9_-]
///   "title": "Example",       // optional
///   "is_active": true         // optional, default true
/// }
/// ```
///
/// # Errors
///
/// - 400 for a bad URL or a malformed/reserved short code
/// - 409 if the requested short code is taken
/// - 503 if no free generated code was found
pub async fn create_link_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AppJson(payload): AppJson<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    payload.validate()?;

    let link = state
        .link_service
        .create(
            user.id,
            CreateLink {
                target_url: payload.target_url,
                title: payload.title,
                short_code: payload.short_code,
                is_active: payload.is_active,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(&state, link))))
}

/// Lists the caller's links.
///
/// # Endpoint
///
/// `GET /api/v1/links?limit=20&offset=0&query=docs&active=true&sort_by=created_at&order_by=desc`
///
/// # Errors
///
/// Returns 400 for an unknown `sort_by` or `order_by`.
pub async fn list_links_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AppQuery(params): AppQuery<ListLinksQuery>,
) -> Result<Json<LinkListResponse>, AppError> {
    let filter = params.into_filter()?;
    let (limit, offset) = (filter.limit, filter.offset);

    let (links, total) = state.link_service.list(user.id, &filter).await?;

    Ok(Json(LinkListResponse {
        links: links
            .into_iter()
            .map(|link| to_response(&state, link))
            .collect(),
        total,
        limit,
        offset,
    }))
}

/// `GET /api/v1/links/{id}`
pub async fn get_link_handler(
    AppPath(id): AppPath<String>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<LinkResponse>, AppError> {
    let id = parse_link_id(&id)?;
    let link = state.link_service.get(user.id, id).await?;

    Ok(Json(to_response(&state, link)))
}

/// Partially updates a link.
///
/// # Endpoint
///
/// `PATCH /api/v1/links/{id}`
///
/// All fields are optional, but at least one must be present. The short code
/// cannot be changed.
pub async fn update_link_handler(
    AppPath(id): AppPath<String>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AppJson(payload): AppJson<UpdateLinkRequest>,
) -> Result<Json<LinkResponse>, AppError> {
    payload.validate()?;
    let id = parse_link_id(&id)?;

    let link = state
        .link_service
        .update(user.id, id, payload.into())
        .await?;

    Ok(Json(to_response(&state, link)))
}

/// Deletes a link and frees its short code.
///
/// # Endpoint
///
/// `DELETE /api/v1/links/{id}`
pub async fn delete_link_handler(
    AppPath(id): AppPath<String>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<StatusCode, AppError> {
    let id = parse_link_id(&id)?;
    state.link_service.delete(user.id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

fn parse_link_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse::<Uuid>()
        .map_err(|_| AppError::bad_request("Invalid link ID", json!({ "id": raw })))
}

fn to_response(state: &AppState, link: Link) -> LinkResponse {
    let short_url = state.link_service.short_url(&link.short_code);
    LinkResponse::new(link, short_url)
}
