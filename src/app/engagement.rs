use anyhow::Result;
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use crate::app::users::summary_from_row;
use crate::domain::engagement::{Comment, LikeToggle};
use crate::infra::db::Db;
use crate::infra::storage::ObjectStorage;

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
    storage: ObjectStorage,
}

impl EngagementService {
    pub fn new(db: Db, storage: ObjectStorage) -> Self {
        Self { db, storage }
    }

    /// Removes the viewer's like if present, otherwise adds it.
    pub async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> Result<LikeToggle> {
        let removed = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        // A racing toggle may have inserted first; only the request that
        // created the row reports a new like.
        let liked = if removed.rows_affected() > 0 {
            false
        } else {
            let inserted = sqlx::query(
                "INSERT INTO likes (post_id, user_id) VALUES ($1, $2) \
                 ON CONFLICT ON CONSTRAINT likes_post_user_key DO NOTHING",
            )
            .bind(post_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
            inserted.rows_affected() == 1
        };

        let count = self.like_count(post_id).await?;
        Ok(LikeToggle { liked, count })
    }

    pub async fn like_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    pub async fn add_comment(&self, author_id: Uuid, post_id: Uuid, text: &str) -> Result<Comment> {
        let row = sqlx::query(
            "WITH inserted AS ( \
                 INSERT INTO comments (post_id, author_id, text) VALUES ($1, $2, $3) \
                 RETURNING id, post_id, author_id, text, created_at \
             ) \
             SELECT c.id, c.post_id, c.text, c.created_at, \
                    u.id AS author_id, u.username AS author_username, pr.avatar_key AS author_avatar_key \
             FROM inserted c \
             JOIN users u ON u.id = c.author_id \
             LEFT JOIN profiles pr ON pr.user_id = u.id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Comment {
            id: row.get("id"),
            post_id: row.get("post_id"),
            author: summary_from_row(&row, &self.storage, "author"),
            text: row.get("text"),
            created_at: row.get("created_at"),
        })
    }

    pub async fn comment_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Comments for each of `post_ids`, oldest first.
    pub async fn comments_for_posts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Comment>>> {
        let mut by_post: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        if post_ids.is_empty() {
            return Ok(by_post);
        }

        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.text, c.created_at, \
                    u.id AS author_id, u.username AS author_username, pr.avatar_key AS author_avatar_key \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             LEFT JOIN profiles pr ON pr.user_id = u.id \
             WHERE c.post_id = ANY($1) \
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(post_ids)
        .fetch_all(self.db.pool())
        .await?;

        for row in rows {
            let comment = Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                author: summary_from_row(&row, &self.storage, "author"),
                text: row.get("text"),
                created_at: row.get("created_at"),
            };
            by_post.entry(comment.post_id).or_default().push(comment);
        }

        Ok(by_post)
    }
}
