//! Database row types — these map directly to SQLite rows.
//! Distinct from the switchboard-types wire models to keep the DB layer
//! independent; conversion helpers below parse ids and timestamps.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};

use switchboard_types::models::{ChatMessage, MessageStatus, Notification, NotificationKind, RoomKind};

pub struct UserRow {
    pub id: String,
    pub display_name: String,
    pub role: String,
    pub locale: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub owner_id: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub room_kind: String,
    pub conversation_id: String,
    pub sender_id: Option<String>,
    pub recipient_id: Option<String>,
    pub body: String,
    pub sender_is_admin: bool,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub recipient_user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: String,
    pub is_read: bool,
    pub created_at: String,
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .with_context(|| format!("corrupt {} timestamp '{}'", column, raw))
}

impl MessageRow {
    pub fn from_chat_message(message: &ChatMessage) -> Self {
        Self {
            id: message.id.to_string(),
            room_kind: room_kind_str(message.room_kind).to_string(),
            conversation_id: message.conversation_id.to_string(),
            sender_id: message.sender_id.map(|id| id.to_string()),
            recipient_id: message.recipient_id.map(|id| id.to_string()),
            body: message.body.clone(),
            sender_is_admin: message.sender_is_admin,
            status: message.status.as_str().to_string(),
            created_at: message.created_at.to_rfc3339(),
            updated_at: message.updated_at.to_rfc3339(),
        }
    }

    pub fn into_chat_message(self) -> Result<ChatMessage> {
        Ok(ChatMessage {
            id: self.id.parse().context("corrupt message id")?,
            room_kind: parse_room_kind(&self.room_kind)?,
            conversation_id: self
                .conversation_id
                .parse()
                .context("corrupt conversation id")?,
            sender_id: self
                .sender_id
                .map(|s| s.parse().context("corrupt sender id"))
                .transpose()?,
            recipient_id: self
                .recipient_id
                .map(|s| s.parse().context("corrupt recipient id"))
                .transpose()?,
            body: self.body,
            sender_is_admin: self.sender_is_admin,
            status: MessageStatus::parse(&self.status)
                .ok_or_else(|| anyhow!("unknown message status '{}'", self.status))?,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            updated_at: parse_timestamp(&self.updated_at, "updated_at")?,
        })
    }
}

impl NotificationRow {
    pub fn from_notification(notification: &Notification) -> Self {
        Self {
            id: notification.id.to_string(),
            recipient_user_id: notification.recipient_user_id.to_string(),
            kind: notification.kind.as_str().to_string(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            link: notification.link.clone(),
            is_read: notification.is_read,
            created_at: notification.created_at.to_rfc3339(),
        }
    }

    pub fn into_notification(self) -> Result<Notification> {
        Ok(Notification {
            id: self.id.parse().context("corrupt notification id")?,
            recipient_user_id: self
                .recipient_user_id
                .parse()
                .context("corrupt recipient id")?,
            kind: NotificationKind::parse(&self.kind)
                .ok_or_else(|| anyhow!("unknown notification kind '{}'", self.kind))?,
            title: self.title,
            body: self.body,
            link: self.link,
            is_read: self.is_read,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
        })
    }
}

pub fn parse_room_kind(raw: &str) -> Result<RoomKind> {
    match raw {
        "live" => Ok(RoomKind::Live),
        "bubble" => Ok(RoomKind::Bubble),
        other => Err(anyhow!("unknown room kind '{}'", other)),
    }
}

pub fn room_kind_str(kind: RoomKind) -> &'static str {
    match kind {
        RoomKind::Live => "live",
        RoomKind::Bubble => "bubble",
    }
}
