use std::time::{SystemTime, UNIX_EPOCH};

/// Per-IP limits for the unauthenticated account endpoints.
#[derive(Debug, Clone, Copy)]
pub struct AuthThrottle {
    pub login_per_hour: u32,
    pub signup_per_hour: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Hour,
}

impl RateWindow {
    pub fn seconds(&self) -> u64 {
        match self {
            RateWindow::Hour => 3600,
        }
    }
}

/// Index of the fixed window containing the current instant.
pub fn current_window(window_seconds: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    now / window_seconds
}
