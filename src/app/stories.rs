use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::app::users::summary_from_row;
use crate::domain::post::is_video_name;
use crate::domain::story::{group_story_rings, ActiveStory, Story, StoryRing};
use crate::infra::db::Db;
use crate::infra::storage::ObjectStorage;

#[derive(Clone)]
pub struct StoryService {
    db: Db,
    storage: ObjectStorage,
}

impl StoryService {
    pub fn new(db: Db, storage: ObjectStorage) -> Self {
        Self { db, storage }
    }

    pub async fn create_story(&self, user_id: Uuid, media_key: &str) -> Result<Story> {
        let row = sqlx::query(
            "INSERT INTO stories (user_id, media_key) VALUES ($1, $2) \
             RETURNING id, user_id, media_key, created_at",
        )
        .bind(user_id)
        .bind(media_key)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Story {
            id: row.get("id"),
            user_id: row.get("user_id"),
            media_key: row.get("media_key"),
            created_at: row.get("created_at"),
        })
    }

    pub async fn get_story(&self, story_id: Uuid) -> Result<Option<Story>> {
        let row = sqlx::query("SELECT id, user_id, media_key, created_at FROM stories WHERE id = $1")
            .bind(story_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| Story {
            id: row.get("id"),
            user_id: row.get("user_id"),
            media_key: row.get("media_key"),
            created_at: row.get("created_at"),
        }))
    }

    /// Records that `viewer_id` saw the story. Repeated views are no-ops.
    pub async fn mark_viewed(&self, story_id: Uuid, viewer_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO story_views (story_id, viewer_id) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT story_views_story_viewer_key DO NOTHING",
        )
        .bind(story_id)
        .bind(viewer_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// The home story strip: one ring per author with an active story.
    pub async fn story_rings(&self, viewer_id: Uuid) -> Result<Vec<StoryRing>> {
        let rows = sqlx::query(
            "SELECT s.id, s.media_key, s.created_at, \
                    u.id AS author_id, u.username AS author_username, pr.avatar_key AS author_avatar_key, \
                    EXISTS ( \
                        SELECT 1 FROM story_views v WHERE v.story_id = s.id AND v.viewer_id = $1 \
                    ) AS viewed \
             FROM stories s \
             JOIN users u ON u.id = s.user_id \
             LEFT JOIN profiles pr ON pr.user_id = u.id \
             WHERE s.created_at > now() - interval '24 hours' \
             ORDER BY s.created_at DESC, s.id DESC",
        )
        .bind(viewer_id)
        .fetch_all(self.db.pool())
        .await?;

        let stories = rows
            .iter()
            .map(|row| {
                let media_key: String = row.get("media_key");
                ActiveStory {
                    id: row.get("id"),
                    author: summary_from_row(row, &self.storage, "author"),
                    media_url: self.storage.public_url(&media_key),
                    is_video: is_video_name(&media_key),
                    created_at: row.get("created_at"),
                    viewed: row.get("viewed"),
                }
            })
            .collect();

        Ok(group_story_rings(stories))
    }
}
