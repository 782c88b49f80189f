use anyhow::Result;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::engagement::EngagementService;
use crate::app::users::summary_from_row;
use crate::domain::engagement::Comment;
use crate::domain::post::{PostCard, VIDEO_EXTENSIONS};
use crate::infra::db::Db;
use crate::infra::storage::ObjectStorage;

pub const HOME_LIMIT: i64 = 50;
pub const EXPLORE_LIMIT: i64 = 60;
pub const REELS_LIMIT: i64 = 60;

const CARD_COLUMNS: &str = "p.id, p.caption, p.media_key, p.created_at, \
     u.id AS author_id, u.username AS author_username, pr.avatar_key AS author_avatar_key, \
     (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count, \
     (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count";

const CARD_JOINS: &str = "FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN profiles pr ON pr.user_id = u.id";

/// A post on the home page, with the viewer's like state and its comments.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub card: PostCard,
    pub liked_by_viewer: bool,
    pub comments: Vec<Comment>,
}

#[derive(Clone)]
pub struct FeedService {
    db: Db,
    storage: ObjectStorage,
}

impl FeedService {
    pub fn new(db: Db, storage: ObjectStorage) -> Self {
        Self { db, storage }
    }

    /// Newest posts from everyone, decorated for `viewer_id`.
    pub async fn home(&self, viewer_id: Uuid) -> Result<Vec<FeedPost>> {
        let sql = format!(
            "SELECT {}, \
                    EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1) AS liked_by_viewer \
             {} \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $2",
            CARD_COLUMNS, CARD_JOINS
        );
        let rows = sqlx::query(&sql)
            .bind(viewer_id)
            .bind(HOME_LIMIT)
            .fetch_all(self.db.pool())
            .await?;

        let post_ids: Vec<Uuid> = rows.iter().map(|row| row.get("id")).collect();
        let mut comments = EngagementService::new(self.db.clone(), self.storage.clone())
            .comments_for_posts(&post_ids)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let card = self.card_from_row(row);
                FeedPost {
                    liked_by_viewer: row.get("liked_by_viewer"),
                    comments: comments.remove(&card.id).unwrap_or_default(),
                    card,
                }
            })
            .collect())
    }

    pub async fn explore(&self) -> Result<Vec<PostCard>> {
        let sql = format!(
            "SELECT {} {} ORDER BY p.created_at DESC, p.id DESC LIMIT $1",
            CARD_COLUMNS, CARD_JOINS
        );
        let rows = sqlx::query(&sql)
            .bind(EXPLORE_LIMIT)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.iter().map(|row| self.card_from_row(row)).collect())
    }

    /// Newest video posts only.
    pub async fn reels(&self) -> Result<Vec<PostCard>> {
        let sql = format!(
            "SELECT {} {} \
             WHERE lower(p.media_key) LIKE ANY($1) \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $2",
            CARD_COLUMNS, CARD_JOINS
        );
        let rows = sqlx::query(&sql)
            .bind(video_patterns())
            .bind(REELS_LIMIT)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.iter().map(|row| self.card_from_row(row)).collect())
    }

    /// All posts by `author_id`, newest first.
    pub async fn by_author(&self, author_id: Uuid) -> Result<Vec<PostCard>> {
        let sql = format!(
            "SELECT {} {} WHERE p.author_id = $1 ORDER BY p.created_at DESC, p.id DESC",
            CARD_COLUMNS, CARD_JOINS
        );
        let rows = sqlx::query(&sql)
            .bind(author_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.iter().map(|row| self.card_from_row(row)).collect())
    }

    fn card_from_row(&self, row: &PgRow) -> PostCard {
        let media_key: String = row.get("media_key");
        PostCard {
            id: row.get("id"),
            author: summary_from_row(row, &self.storage, "author"),
            caption: row.get("caption"),
            media_url: self.storage.public_url(&media_key),
            is_video: crate::domain::post::is_video_name(&media_key),
            created_at: row.get("created_at"),
            like_count: row.get("like_count"),
            comment_count: row.get("comment_count"),
        }
    }
}

fn video_patterns() -> Vec<String> {
    VIDEO_EXTENSIONS
        .iter()
        .map(|ext| format!("%.{}", ext))
        .collect()
}
