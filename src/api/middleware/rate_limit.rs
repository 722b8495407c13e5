//! Per-client-IP admission control on top of [`RateLimiter`].
//!
//! Every gated response carries `X-RateLimit-Limit`, `X-RateLimit-Remaining`
//! and `X-RateLimit-Reset` (epoch seconds), whether it was admitted or not.
//! Denied requests answer `429` with `Retry-After`.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::error::AppError;
use crate::security::{Decision, RateLimiter};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Middleware state: which limiter gates the routes and how the client is keyed.
#[derive(Clone)]
pub struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
    behind_proxy: bool,
}

impl RateLimitGuard {
    /// `behind_proxy` makes the guard read the client IP from
    /// `X-Forwarded-For` / `X-Real-IP` before the peer socket address.
    /// Enable only behind a trusted reverse proxy.
    pub fn new(limiter: Arc<RateLimiter>, behind_proxy: bool) -> Self {
        Self {
            limiter,
            behind_proxy,
        }
    }
}

/// Admits or rejects the request against the guard's limiter.
///
/// # Example
///
/// ```rust,ignore
/// let auth = api::routes::auth_routes().layer(middleware::from_fn_with_state(
///     RateLimitGuard::new(state.auth_limiter.clone(), state.behind_proxy),
///     rate_limit::layer,
/// ));
/// ```
pub async fn layer(State(guard): State<RateLimitGuard>, req: Request, next: Next) -> Response {
    let key = client_ip(&req, guard.behind_proxy)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let decision = guard.limiter.allow(&key);

    let mut response = if decision.permitted {
        next.run(req).await
    } else {
        let scope = guard.limiter.name();
        metrics::counter!("rate_limit_denied_total", "scope" => scope).increment(1);
        tracing::debug!(scope, client = %key, "Rate limit exceeded");

        let retry_after = decision.retry_after_seconds();
        let mut response = AppError::rate_limited(
            "Too many requests",
            json!({ "scope": scope, "retry_after": retry_after }),
        )
        .into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        response
    };

    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(decision.reset_epoch_seconds()),
    );
}

/// Client address used as the limiter key.
///
/// Falls back to the peer address when the proxy headers are absent or
/// unparsable. `None` only when neither is available.
pub fn client_ip(req: &Request, behind_proxy: bool) -> Option<IpAddr> {
    if behind_proxy && let Some(ip) = forwarded_ip(req.headers()) {
        return Some(ip);
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let first_forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    first_forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}
