use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Served when a profile has no uploaded avatar.
pub const DEFAULT_AVATAR_URL: &str = "/static/core/default-avatar.svg";

pub const MAX_BIO_LEN: usize = 160;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub avatar_key: Option<String>,
    pub bio: String,
}

/// Compact author/actor representation embedded in page payloads.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: String,
}

impl UserSummary {
    pub fn new(id: Uuid, username: String, avatar_url: Option<String>) -> Self {
        Self {
            id,
            username,
            avatar_url: avatar_url.unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileStats {
    pub posts: i64,
    pub followers: i64,
    pub following: i64,
}
