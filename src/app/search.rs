use anyhow::Result;
use uuid::Uuid;

use crate::app::users::summary_from_row;
use crate::domain::user::UserSummary;
use crate::infra::db::Db;
use crate::infra::storage::ObjectStorage;

pub const SEARCH_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct SearchService {
    db: Db,
    storage: ObjectStorage,
}

impl SearchService {
    pub fn new(db: Db, storage: ObjectStorage) -> Self {
        Self { db, storage }
    }

    /// Users whose username contains `query`, case-insensitively.
    pub async fn search_users(
        &self,
        query: &str,
        exclude: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<UserSummary>> {
        let pattern = format!("%{}%", escape_like_pattern(query));
        let rows = sqlx::query(
            "SELECT u.id AS user_id, u.username AS user_username, pr.avatar_key AS user_avatar_key \
             FROM users u \
             LEFT JOIN profiles pr ON pr.user_id = u.id \
             WHERE u.username ILIKE $1 ESCAPE '\\' \
               AND ($2::uuid IS NULL OR u.id <> $2) \
             ORDER BY u.username \
             LIMIT $3",
        )
        .bind(pattern)
        .bind(exclude)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| summary_from_row(row, &self.storage, "user"))
            .collect())
    }
}

pub(crate) fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like_pattern("ana"), "ana");
        assert_eq!(escape_like_pattern("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like_pattern("a\\b"), "a\\\\b");
    }
}
