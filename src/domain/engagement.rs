use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::UserSummary;

pub const MAX_COMMENT_LEN: usize = 300;

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: UserSummary,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub count: i64,
}
