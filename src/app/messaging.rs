use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use crate::app::users::summary_from_row;
use crate::domain::messaging::{Message, ThreadSummary};
use crate::domain::realtime::{format_timestamp, ChatMessageEvent, Group, GroupEvent};
use crate::domain::user::UserSummary;
use crate::infra::broker::Broker;
use crate::infra::db::Db;
use crate::infra::storage::ObjectStorage;

#[derive(Clone)]
pub struct MessagingService {
    db: Db,
    storage: ObjectStorage,
    broker: Broker,
}

impl MessagingService {
    pub fn new(db: Db, storage: ObjectStorage, broker: Broker) -> Self {
        Self {
            db,
            storage,
            broker,
        }
    }

    /// The oldest thread shared by both users, or a new one.
    pub async fn find_or_create_thread(&self, user_id: Uuid, other_id: Uuid) -> Result<Uuid> {
        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT t.id \
             FROM message_threads t \
             JOIN thread_participants a ON a.thread_id = t.id AND a.user_id = $1 \
             JOIN thread_participants b ON b.thread_id = t.id AND b.user_id = $2 \
             ORDER BY t.created_at ASC, t.id ASC \
             LIMIT 1",
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_optional(self.db.pool())
        .await?;

        if let Some(thread_id) = existing {
            return Ok(thread_id);
        }

        let mut tx = self.db.pool().begin().await?;
        let thread_id: Uuid =
            sqlx::query_scalar("INSERT INTO message_threads DEFAULT VALUES RETURNING id")
                .fetch_one(&mut *tx)
                .await?;
        sqlx::query(
            "INSERT INTO thread_participants (thread_id, user_id) \
             SELECT $1, participant FROM UNNEST($2::uuid[]) AS participant \
             ON CONFLICT DO NOTHING",
        )
        .bind(thread_id)
        .bind(vec![user_id, other_id])
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(thread_id = %thread_id, user_id = %user_id, other_id = %other_id, "created thread");
        Ok(thread_id)
    }

    /// Threads `user_id` takes part in, newest first.
    pub async fn threads_for(&self, user_id: Uuid) -> Result<Vec<ThreadSummary>> {
        let rows = sqlx::query(
            "SELECT t.id, t.created_at \
             FROM message_threads t \
             JOIN thread_participants p ON p.thread_id = t.id \
             WHERE p.user_id = $1 \
             ORDER BY t.created_at DESC, t.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.get("id")).collect();
        let mut participants = self.participants_of(&ids).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: Uuid = row.get("id");
                ThreadSummary {
                    id,
                    participants: participants.remove(&id).unwrap_or_default(),
                    created_at: row.get("created_at"),
                }
            })
            .collect())
    }

    pub async fn get_thread(&self, thread_id: Uuid) -> Result<Option<ThreadSummary>> {
        let row = sqlx::query("SELECT id, created_at FROM message_threads WHERE id = $1")
            .bind(thread_id)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut participants = self.participants_of(&[thread_id]).await?;

        Ok(Some(ThreadSummary {
            id: row.get("id"),
            participants: participants.remove(&thread_id).unwrap_or_default(),
            created_at: row.get("created_at"),
        }))
    }

    pub async fn is_participant(&self, thread_id: Uuid, user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM thread_participants WHERE thread_id = $1 AND user_id = $2)",
        )
        .bind(thread_id)
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    /// Messages of a thread, oldest first.
    pub async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT m.id, m.thread_id, m.text, m.attachment_key, m.created_at, \
                    u.id AS sender_id, u.username AS sender_username, pr.avatar_key AS sender_avatar_key \
             FROM messages m \
             JOIN users u ON u.id = m.sender_id \
             LEFT JOIN profiles pr ON pr.user_id = u.id \
             WHERE m.thread_id = $1 \
             ORDER BY m.created_at ASC, m.id ASC",
        )
        .bind(thread_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(|row| self.message_from_row(row)).collect())
    }

    /// Stores a message and broadcasts it to the thread's live connections.
    /// Returns `None` when the sender is not a participant of the thread.
    pub async fn send_message(
        &self,
        thread_id: Uuid,
        sender_id: Uuid,
        text: &str,
        attachment_key: Option<&str>,
    ) -> Result<Option<Message>> {
        let row = sqlx::query(
            "WITH inserted AS ( \
                 INSERT INTO messages (thread_id, sender_id, text, attachment_key) \
                 SELECT $1, $2, $3, $4 \
                 WHERE EXISTS ( \
                     SELECT 1 FROM thread_participants WHERE thread_id = $1 AND user_id = $2 \
                 ) \
                 RETURNING id, thread_id, sender_id, text, attachment_key, created_at \
             ) \
             SELECT m.id, m.thread_id, m.text, m.attachment_key, m.created_at, \
                    u.id AS sender_id, u.username AS sender_username, pr.avatar_key AS sender_avatar_key \
             FROM inserted m \
             JOIN users u ON u.id = m.sender_id \
             LEFT JOIN profiles pr ON pr.user_id = u.id",
        )
        .bind(thread_id)
        .bind(sender_id)
        .bind(text)
        .bind(attachment_key)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let message = self.message_from_row(&row);

        let event = GroupEvent::ChatMessage(ChatMessageEvent {
            message_id: message.id,
            sender: message.sender.username.clone(),
            text: message.text.clone(),
            created_at: format_timestamp(message.created_at),
            attachment_url: message.attachment_url.clone(),
        });
        if let Err(err) = self.broker.publish(Group::Chat(thread_id), event).await {
            tracing::warn!(error = ?err, thread_id = %thread_id, "failed to publish chat message");
        }

        Ok(Some(message))
    }

    async fn participants_of(&self, thread_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<UserSummary>>> {
        let mut by_thread: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
        if thread_ids.is_empty() {
            return Ok(by_thread);
        }

        let rows = sqlx::query(
            "SELECT p.thread_id, \
                    u.id AS user_id, u.username AS user_username, pr.avatar_key AS user_avatar_key \
             FROM thread_participants p \
             JOIN users u ON u.id = p.user_id \
             LEFT JOIN profiles pr ON pr.user_id = u.id \
             WHERE p.thread_id = ANY($1) \
             ORDER BY u.username",
        )
        .bind(thread_ids)
        .fetch_all(self.db.pool())
        .await?;

        for row in rows {
            let thread_id: Uuid = row.get("thread_id");
            by_thread
                .entry(thread_id)
                .or_default()
                .push(summary_from_row(&row, &self.storage, "user"));
        }
        Ok(by_thread)
    }

    fn message_from_row(&self, row: &PgRow) -> Message {
        let attachment_key: Option<String> = row.get("attachment_key");
        Message {
            id: row.get("id"),
            thread_id: row.get("thread_id"),
            sender: summary_from_row(row, &self.storage, "sender"),
            text: row.get("text"),
            attachment_url: attachment_key.map(|key| self.storage.public_url(&key)),
            created_at: row.get("created_at"),
        }
    }
}
