use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::post::Post;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(&self, author_id: Uuid, caption: &str, media_key: &str) -> Result<Post> {
        let row = sqlx::query(
            "INSERT INTO posts (author_id, caption, media_key) VALUES ($1, $2, $3) \
             RETURNING id, author_id, caption, media_key, created_at",
        )
        .bind(author_id)
        .bind(caption)
        .bind(media_key)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Post {
            id: row.get("id"),
            author_id: row.get("author_id"),
            caption: row.get("caption"),
            media_key: row.get("media_key"),
            created_at: row.get("created_at"),
        })
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, author_id, caption, media_key, created_at FROM posts WHERE id = $1",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| Post {
            id: row.get("id"),
            author_id: row.get("author_id"),
            caption: row.get("caption"),
            media_key: row.get("media_key"),
            created_at: row.get("created_at"),
        }))
    }

    /// Deletes the post if `author_id` wrote it. Likes and comments cascade.
    pub async fn delete_post(&self, post_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(post_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
