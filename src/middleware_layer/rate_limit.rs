use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::{error::AppError, state::AppState};

/// Guest sessions one IP may mint per window.
const GUEST_SESSION_LIMIT: i32 = 10;

/// Window length in seconds for the guest-session counter.
const GUEST_SESSION_WINDOW_SECS: i64 = 3600;

/// Extracts the real IP address from the request extensions.
///
/// # Arguments
///
/// * `req` - The incoming request.
///
/// # Returns
///
/// The peer IP as a string, or `"unknown"`.
fn extract_real_ip(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// A middleware that rate limits guest-session minting per IP.
///
/// Guest minting is the only anonymous write path, so it gets its own
/// counter on top of the global governor. Redis failures let the request
/// through; the governor still bounds the worst case.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The inner `Response`, or the rate-limit error response.
pub async fn rate_limit_guest_session(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = extract_real_ip(&req);
    let key = format!("rate_limit:guest_session:{}", ip);

    let count: Option<i32> = redis::cmd("GET")
        .arg(&key)
        .query_async(&mut state.redis.clone())
        .await
        .unwrap_or(None);

    if let Some(attempts) = count {
        if attempts >= GUEST_SESSION_LIMIT {
            let ttl: Option<i32> = redis::cmd("TTL")
                .arg(&key)
                .query_async(&mut state.redis.clone())
                .await
                .unwrap_or(None);

            return AppError::RateLimitExceeded(format!(
                "Too many guest sessions from this address. Try again in {} minutes",
                ttl.unwrap_or(0) / 60
            ))
            .into_response();
        }
    }

    let response = next.run(req).await;

    // Only successful mints consume the budget; a revoked or mistyped link
    // does not lock a guest out of a corrected one.
    if response.status().is_success() {
        let _: () = redis::cmd("INCR")
            .arg(&key)
            .query_async(&mut state.redis.clone())
            .await
            .unwrap_or(());

        let _: () = redis::cmd("EXPIRE")
            .arg(&key)
            .arg(GUEST_SESSION_WINDOW_SECS)
            .query_async(&mut state.redis.clone())
            .await
            .unwrap_or(());
    }

    response
}
