use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// Timestamps on the wire are RFC 3339 strings.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

/// A broadcast group that live connections can join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Chat(Uuid),
    Notifications(Uuid),
}

impl Group {
    pub fn name(&self) -> String {
        match self {
            Group::Chat(thread_id) => format!("chat_{}", thread_id),
            Group::Notifications(user_id) => format!("notif_{}", user_id),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        if let Some(id) = name.strip_prefix("chat_") {
            return Uuid::parse_str(id).ok().map(Group::Chat);
        }
        if let Some(id) = name.strip_prefix("notif_") {
            return Uuid::parse_str(id).ok().map(Group::Notifications);
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageEvent {
    pub message_id: Uuid,
    pub sender: String,
    pub text: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub title: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GroupEvent {
    #[serde(rename = "chat.message")]
    ChatMessage(ChatMessageEvent),
    #[serde(rename = "notif.message")]
    Notification(NotificationEvent),
}

impl GroupEvent {
    /// The JSON frame forwarded to a connected client. Chat frames keep the
    /// `type` tag; notification frames carry only title, text and timestamp.
    pub fn client_payload(&self) -> serde_json::Result<String> {
        match self {
            GroupEvent::ChatMessage(_) => serde_json::to_string(self),
            GroupEvent::Notification(event) => serde_json::to_string(event),
        }
    }
}
