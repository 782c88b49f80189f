use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::app::rate_limiter::RateLimiter;
use crate::config::rate_limits::RateWindow;
use crate::http::AppError;
use crate::AppState;

/// Per-IP throttle for the account endpoints (`POST /login`, `POST /signup`).
pub async fn ip_rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let throttle = state.auth_throttle;
    let rate_limit_config = match (request.uri().path(), request.method().as_str()) {
        ("/login", "POST") => Some(("login", throttle.login_per_hour)),
        ("/signup", "POST") => Some(("signup", throttle.signup_per_hour)),
        _ => None,
    };

    let (action, limit) = match rate_limit_config {
        Some(config) => config,
        None => return Ok(next.run(request).await),
    };

    let ip = addr.ip().to_string();
    let rate_limiter = RateLimiter::new(state.cache.clone());

    let is_limited = rate_limiter
        .check_ip_rate_limit(&ip, action, limit, RateWindow::Hour)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to check IP rate limit");
            AppError::internal("failed to check rate limit")
        })?;

    if is_limited {
        tracing::warn!(ip = %ip, action = action, "IP rate limit exceeded");
        return Err(AppError::rate_limited(
            "Too many attempts from your IP address. Please try again later.",
        ));
    }

    if let Err(err) = rate_limiter.increment_ip(&ip, action, RateWindow::Hour).await {
        tracing::warn!(error = ?err, "failed to increment IP rate limit counter");
    }

    Ok(next.run(request).await)
}
