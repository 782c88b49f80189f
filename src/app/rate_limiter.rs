use anyhow::Result;
use redis::AsyncCommands;

use crate::config::rate_limits::{current_window, RateWindow};
use crate::infra::cache::RedisCache;

#[derive(Clone)]
pub struct RateLimiter {
    cache: RedisCache,
}

impl RateLimiter {
    pub fn new(cache: RedisCache) -> Self {
        Self { cache }
    }

    /// True when `ip` has already used `limit` attempts of `action` in the current window.
    pub async fn check_ip_rate_limit(
        &self,
        ip: &str,
        action: &str,
        limit: u32,
        window: RateWindow,
    ) -> Result<bool> {
        let key = ip_key(ip, action, window);
        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;
        let count: Option<u32> = conn.get(&key).await?;
        let count = count.unwrap_or(0);

        if count >= limit {
            tracing::debug!(
                ip = ip,
                action = action,
                count = count,
                limit = limit,
                "IP rate limit exceeded"
            );
            return Ok(true);
        }

        Ok(false)
    }

    pub async fn increment_ip(&self, ip: &str, action: &str, window: RateWindow) -> Result<()> {
        let key = ip_key(ip, action, window);
        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;

        let count: u32 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(&key, window.seconds() as i64).await?;
        }

        Ok(())
    }
}

fn ip_key(ip: &str, action: &str, window: RateWindow) -> String {
    let window_seconds = window.seconds();
    format!(
        "ratelimit:ip:{}:{}:{}",
        ip,
        action,
        current_window(window_seconds)
    )
}
