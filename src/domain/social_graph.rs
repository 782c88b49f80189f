use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FollowToggle {
    pub following: bool,
    pub followers: i64,
}
