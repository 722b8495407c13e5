//! Handlers for registration, login, refresh and logout.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use validator::Validate;

use crate::api::dto::auth::{
    LoginRequest, LoginResponse, RefreshResponse, RefreshTokenRequest, RegisterRequest,
    UserResponse,
};
use crate::api::extract::AppJson;
use crate::error::AppError;
use crate::state::AppState;

/// Creates an account.
///
/// # Endpoint
///
/// `POST /api/v1/auth/register`
///
/// # Request Body
///
/// ```json
/// { "email": "user@example.com", "password": "password123" }
/// ```
///
/// # Errors
///
/// - 400 if the email is malformed or the password is shorter than 8 characters
/// - 409 if the email (after trimming and lowercasing) is already registered
pub async fn register_handler(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    payload.validate()?;

    let user = state
        .auth_service
        .register(&payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Exchanges credentials for an access and refresh token.
///
/// # Endpoint
///
/// `POST /api/v1/auth/login`
///
/// # Errors
///
/// Returns 401 for an unknown email or a wrong password alike.
pub async fn login_handler(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;

    let pair = state
        .auth_service
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(pair.into()))
}

/// Mints a new access token from a refresh token.
///
/// # Endpoint
///
/// `POST /api/v1/auth/refresh`
///
/// With rotation enabled the response also carries a new refresh token and
/// the presented one stops working.
///
/// # Errors
///
/// Returns 401 if the refresh token is unknown, revoked or expired.
pub async fn refresh_handler(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshTokenRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    payload.validate()?;

    let access = state.auth_service.refresh(&payload.refresh_token).await?;

    Ok(Json(RefreshResponse::new(access, Utc::now())))
}

/// Revokes a refresh token.
///
/// # Endpoint
///
/// `POST /api/v1/auth/logout`
///
/// Logging out twice with the same token succeeds both times.
///
/// # Errors
///
/// Returns 404 if no session was ever issued for the token.
pub async fn logout_handler(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshTokenRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;

    state.auth_service.logout(&payload.refresh_token).await?;

    Ok(StatusCode::NO_CONTENT)
}
