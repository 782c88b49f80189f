use axum::{middleware, routing::get, routing::post, Router};

use crate::http::middleware::rate_limit::ip_rate_limit_middleware;
use crate::http::{handlers, ws};
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

/// Account endpoints. Login and signup sit behind the per-IP throttle.
pub fn accounts(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route_layer(middleware::from_fn_with_state(state, ip_rate_limit_middleware))
        .route("/logout", post(handlers::logout))
        .route("/auth/refresh", post(handlers::refresh_token))
}

pub fn pages() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::home))
        .route("/search", get(handlers::search))
        .route("/explore", get(handlers::explore))
        .route("/reels", get(handlers::reels))
        .route("/profile/:username", get(handlers::profile))
        .route("/profile/:username/edit", post(handlers::edit_profile))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/create", post(handlers::create_post))
        .route("/post/delete/:post_id", post(handlers::delete_post))
}

pub fn engagement() -> Router<AppState> {
    Router::new()
        .route("/api/like/:post_id", post(handlers::like_post))
        .route("/api/comment/:post_id", post(handlers::comment_post))
        .route("/api/follow/:username", post(handlers::follow_user))
}

pub fn messaging() -> Router<AppState> {
    Router::new()
        .route("/messages", get(handlers::messages_page))
        .route("/messages/start/:username", post(handlers::start_thread))
        .route("/messages/upload", post(handlers::upload_message))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::notifications_page))
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
}

pub fn stories() -> Router<AppState> {
    Router::new()
        .route("/stories/add", post(handlers::add_story))
        .route("/stories/mark_viewed", post(handlers::mark_story_viewed))
}

pub fn sockets() -> Router<AppState> {
    Router::new()
        .route("/ws/chat/:thread_id", get(ws::chat_socket))
        .route("/ws/notif", get(ws::notification_socket))
}
