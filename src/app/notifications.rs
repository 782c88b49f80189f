use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::users::summary_from_row;
use crate::domain::notification::{clamp_text, Notification};
use crate::domain::realtime::{format_timestamp, Group, GroupEvent, NotificationEvent};
use crate::infra::broker::Broker;
use crate::infra::db::Db;
use crate::infra::storage::ObjectStorage;

pub const NOTIFICATION_PAGE_SIZE: i64 = 50;

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
    storage: ObjectStorage,
    broker: Broker,
}

impl NotificationService {
    pub fn new(db: Db, storage: ObjectStorage, broker: Broker) -> Self {
        Self {
            db,
            storage,
            broker,
        }
    }

    /// Stores the notification, then pushes it to the recipient's live
    /// connections. Delivery failures are logged and otherwise ignored.
    pub async fn push(
        &self,
        user_id: Uuid,
        actor_id: Option<Uuid>,
        title: &str,
        text: &str,
    ) -> Result<Uuid> {
        let text = clamp_text(text);
        let row = sqlx::query(
            "INSERT INTO notifications (user_id, actor_id, title, text) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, created_at",
        )
        .bind(user_id)
        .bind(actor_id)
        .bind(title)
        .bind(&text)
        .fetch_one(self.db.pool())
        .await?;

        let id: Uuid = row.get("id");
        let created_at: OffsetDateTime = row.get("created_at");

        let event = GroupEvent::Notification(NotificationEvent {
            title: title.to_string(),
            text,
            created_at: format_timestamp(created_at),
        });
        if let Err(err) = self.broker.publish(Group::Notifications(user_id), event).await {
            tracing::warn!(error = ?err, user_id = %user_id, "failed to publish notification");
        }

        Ok(id)
    }

    /// Latest notifications for `user_id`, newest first.
    pub async fn list(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT n.id, n.user_id, n.title, n.text, n.seen, n.created_at, \
                    a.id AS actor_id, a.username AS actor_username, pr.avatar_key AS actor_avatar_key \
             FROM notifications n \
             LEFT JOIN users a ON a.id = n.actor_id \
             LEFT JOIN profiles pr ON pr.user_id = a.id \
             WHERE n.user_id = $1 \
             ORDER BY n.created_at DESC, n.id DESC \
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut notifications = Vec::with_capacity(rows.len());
        for row in rows {
            let actor_id: Option<Uuid> = row.get("actor_id");
            let actor = actor_id.map(|_| summary_from_row(&row, &self.storage, "actor"));
            notifications.push(Notification {
                id: row.get("id"),
                user_id: row.get("user_id"),
                actor,
                title: row.get("title"),
                text: row.get("text"),
                seen: row.get("seen"),
                created_at: row.get("created_at"),
            });
        }

        Ok(notifications)
    }

    pub async fn unseen_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT seen",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    /// False when the notification does not belong to `user_id`.
    pub async fn mark_seen(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET seen = true WHERE id = $1 AND user_id = $2",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
