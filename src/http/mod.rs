use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod forms;
mod handlers;
mod middleware;
mod routes;
mod ws;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let body_limit = state.upload_max_bytes;

    Router::new()
        .merge(routes::health())
        .merge(routes::accounts(state.clone()))
        .merge(routes::pages())
        .merge(routes::posts())
        .merge(routes::engagement())
        .merge(routes::messaging())
        .merge(routes::notifications())
        .merge(routes::stories())
        .merge(routes::sockets())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
