use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::user::{Profile, ProfileStats, User, UserSummary};
use crate::infra::db::Db;
use crate::infra::storage::ObjectStorage;

/// Requested avatar change on profile edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarChange {
    Keep,
    Replace(String),
    Clear,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
    storage: ObjectStorage,
}

impl UserService {
    pub fn new(db: Db, storage: ObjectStorage) -> Self {
        Self { db, storage }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            created_at: row.get("created_at"),
        }))
    }

    pub async fn get_summary(&self, user_id: Uuid) -> Result<Option<UserSummary>> {
        let row = sqlx::query(
            "SELECT u.id AS user_id, u.username AS user_username, pr.avatar_key AS user_avatar_key \
             FROM users u \
             LEFT JOIN profiles pr ON pr.user_id = u.id \
             WHERE u.id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| summary_from_row(&row, &self.storage, "user")))
    }

    /// Loads the profile, creating an empty one for accounts that predate it.
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile> {
        let row = sqlx::query(
            "WITH ensured AS ( \
                 INSERT INTO profiles (user_id) VALUES ($1) \
                 ON CONFLICT (user_id) DO NOTHING \
                 RETURNING user_id, avatar_key, bio \
             ) \
             SELECT user_id, avatar_key, bio FROM ensured \
             UNION ALL \
             SELECT user_id, avatar_key, bio FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Profile {
            user_id: row.get("user_id"),
            avatar_key: row.get("avatar_key"),
            bio: row.get("bio"),
        })
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<ProfileStats> {
        let row = sqlx::query(
            "SELECT \
                 (SELECT COUNT(*) FROM posts WHERE author_id = $1) AS posts, \
                 (SELECT COUNT(*) FROM follows WHERE following_id = $1) AS followers, \
                 (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(ProfileStats {
            posts: row.get("posts"),
            followers: row.get("followers"),
            following: row.get("following"),
        })
    }

    /// Applies the edit and returns the avatar key that is no longer referenced.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        bio: Option<String>,
        avatar: AvatarChange,
    ) -> Result<Option<String>> {
        let previous = self.get_profile(user_id).await?;

        let (set_avatar, avatar_key) = match &avatar {
            AvatarChange::Keep => (false, None),
            AvatarChange::Replace(key) => (true, Some(key.clone())),
            AvatarChange::Clear => (true, None),
        };

        sqlx::query(
            "UPDATE profiles \
             SET bio = COALESCE($2, bio), \
                 avatar_key = CASE WHEN $3 THEN $4 ELSE avatar_key END \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(bio)
        .bind(set_avatar)
        .bind(avatar_key)
        .execute(self.db.pool())
        .await?;

        Ok(if set_avatar { previous.avatar_key } else { None })
    }

    pub fn avatar_url(&self, avatar_key: Option<&str>) -> Option<String> {
        avatar_key.map(|key| self.storage.public_url(key))
    }
}

/// Reads `<prefix>_id`, `<prefix>_username` and `<prefix>_avatar_key` from a joined row.
pub(crate) fn summary_from_row(row: &PgRow, storage: &ObjectStorage, prefix: &str) -> UserSummary {
    let id: Uuid = row.get(format!("{}_id", prefix).as_str());
    let username: String = row.get(format!("{}_username", prefix).as_str());
    let avatar_key: Option<String> = row.get(format!("{}_avatar_key", prefix).as_str());
    UserSummary::new(id, username, avatar_key.map(|key| storage.public_url(&key)))
}
