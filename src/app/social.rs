use anyhow::Result;
use uuid::Uuid;

use crate::domain::social_graph::FollowToggle;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Unfollows if `follower_id` already follows `target_id`, otherwise follows.
    /// Callers reject self-follows before reaching here.
    pub async fn toggle_follow(&self, follower_id: Uuid, target_id: Uuid) -> Result<FollowToggle> {
        let removed = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND following_id = $2",
        )
        .bind(follower_id)
        .bind(target_id)
        .execute(self.db.pool())
        .await?;

        let following = if removed.rows_affected() > 0 {
            false
        } else {
            let inserted = sqlx::query(
                "INSERT INTO follows (follower_id, following_id) \
                 SELECT $1, $2 WHERE $1 <> $2 \
                 ON CONFLICT ON CONSTRAINT follows_pair_key DO NOTHING",
            )
            .bind(follower_id)
            .bind(target_id)
            .execute(self.db.pool())
            .await?;
            inserted.rows_affected() == 1
        };

        let followers = self.follower_count(target_id).await?;
        Ok(FollowToggle {
            following,
            followers,
        })
    }

    pub async fn follower_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE following_id = $1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    pub async fn is_following(&self, follower_id: Uuid, target_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower_id)
        .bind(target_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    pub async fn following_ids(&self, follower_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT following_id FROM follows WHERE follower_id = $1 ORDER BY created_at DESC",
        )
        .bind(follower_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(ids)
    }
}
