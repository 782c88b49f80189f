pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::config::rate_limits::AuthThrottle;
use crate::infra::{broker::Broker, cache::RedisCache, db::Db, storage::ObjectStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub storage: ObjectStorage,
    pub broker: Broker,
    pub upload_max_bytes: usize,
    pub paseto_access_key: [u8; 32],
    pub paseto_refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub auth_throttle: AuthThrottle,
    pub cookie_secure: bool,
}
