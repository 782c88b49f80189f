use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::user::UserSummary;

/// How long a story stays visible after it is posted.
pub const STORY_WINDOW: Duration = Duration::hours(24);

#[derive(Debug, Clone)]
pub struct Story {
    pub id: Uuid,
    pub user_id: Uuid,
    pub media_key: String,
    pub created_at: OffsetDateTime,
}

impl Story {
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        now - self.created_at < STORY_WINDOW
    }
}

/// One active story as loaded for the home strip.
#[derive(Debug, Clone)]
pub struct ActiveStory {
    pub id: Uuid,
    pub author: UserSummary,
    pub media_url: String,
    pub is_video: bool,
    pub created_at: OffsetDateTime,
    pub viewed: bool,
}

/// One entry of the story strip: an author's latest active story.
#[derive(Debug, Clone, Serialize)]
pub struct StoryRing {
    pub story_id: Uuid,
    pub author: UserSummary,
    pub media_url: String,
    pub is_video: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub unviewed: bool,
}

/// Collapses newest-first active stories into one ring per author, keeping
/// the first-seen order. A ring is unviewed when any story of that author is.
pub fn group_story_rings(stories: Vec<ActiveStory>) -> Vec<StoryRing> {
    let mut rings: Vec<StoryRing> = Vec::new();
    for story in stories {
        if let Some(ring) = rings.iter_mut().find(|ring| ring.author.id == story.author.id) {
            ring.unviewed |= !story.viewed;
            continue;
        }
        rings.push(StoryRing {
            story_id: story.id,
            author: story.author,
            media_url: story.media_url,
            is_video: story.is_video,
            created_at: story.created_at,
            unviewed: !story.viewed,
        });
    }
    rings
}
