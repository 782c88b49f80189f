pub mod auth;
pub mod engagement;
pub mod feed;
pub mod media;
pub mod messaging;
pub mod notifications;
pub mod posts;
pub mod rate_limiter;
pub mod search;
pub mod social;
pub mod stories;
pub mod users;
