//! Handler for short URL redirect.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio::sync::mpsc::error::TrySendError;

use crate::api::extract::AppPath;
use crate::domain::click_event::ClickEvent;
use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its target URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Click Tracking
///
/// A click event is offered to a bounded queue with `try_send`. The redirect
/// never waits on it: a full queue drops the event and counts it in
/// `clicks_dropped_total`.
///
/// # Errors
///
/// Returns 404 Not Found if the code is unknown or the link is inactive.
pub async fn redirect_handler(
    AppPath(code): AppPath<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let link = state.link_service.resolve(&code).await?;

    match state
        .click_sender
        .try_send(ClickEvent::new(link.short_code.as_str()))
    {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            metrics::counter!("clicks_dropped_total").increment(1);
            tracing::debug!(code = %event.code, "Click queue full, event dropped");
        }
        Err(TrySendError::Closed(event)) => {
            metrics::counter!("clicks_dropped_total").increment(1);
            tracing::warn!(code = %event.code, "Click queue closed, event dropped");
        }
    }

    Ok((StatusCode::FOUND, [(header::LOCATION, link.target_url)]).into_response())
}
