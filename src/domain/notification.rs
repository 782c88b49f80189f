use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::UserSummary;

pub const MAX_TEXT_LEN: usize = 255;

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub actor: Option<UserSummary>,
    pub title: String,
    pub text: String,
    pub seen: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Clamps notification text to the column width on a char boundary.
pub fn clamp_text(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}
