use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two chat surfaces: `live` is the authenticated dashboard channel,
/// `bubble` is the anonymous widget channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Live,
    Bubble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Guest,
}

/// A broadcast scope. Rooms are keyed by kind + conversation, never by
/// conversation alone: a live room and a bubble room may share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId {
    pub kind: RoomKind,
    pub conversation_id: Uuid,
}

impl RoomId {
    pub fn new(kind: RoomKind, conversation_id: Uuid) -> Self {
        Self {
            kind,
            conversation_id,
        }
    }
}

/// Per-connection identity, born at connect and destroyed at disconnect.
/// `user_id` is `None` for anonymous widget visitors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub connection_id: Uuid,
    pub user_id: Option<Uuid>,
    pub role: Role,
    pub display_name: String,
    pub locale: String,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Public view of a session, safe to broadcast in member lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMember {
    pub connection_id: Uuid,
    pub user_id: Option<Uuid>,
    pub display_name: String,
    pub role: Role,
}

impl From<&Session> for RoomMember {
    fn from(session: &Session) -> Self {
        Self {
            connection_id: session.connection_id,
            user_id: session.user_id,
            display_name: session.display_name.clone(),
            role: session.role,
        }
    }
}

/// Message lifecycle. Transitions only move forward: `sent` may become
/// `edited`, `deleted` or `read`; `deleted` never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Edited,
    Deleted,
    Read,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Edited => "edited",
            Self::Deleted => "deleted",
            Self::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "edited" => Some(Self::Edited),
            "deleted" => Some(Self::Deleted),
            "read" => Some(Self::Read),
            _ => None,
        }
    }
}

/// A stored chat message. Broadcasts always carry this canonical row, never
/// the raw client input, so every client observes the server-assigned id and
/// timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub room_kind: RoomKind,
    pub conversation_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub body: String,
    pub sender_is_admin: bool,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Payment,
    Order,
    Subscription,
    SupportMessage,
    System,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Order => "order",
            Self::Subscription => "subscription",
            Self::SupportMessage => "support_message",
            Self::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment" => Some(Self::Payment),
            "order" => Some(Self::Order),
            "subscription" => Some(Self::Subscription),
            "support_message" => Some(Self::SupportMessage),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// A persisted notification. One row per recipient: a fan-out to "both"
/// creates one row per admin plus one for the target user, never a shared row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// The user a notification is about (and, for user-facing fan-out, its
/// recipient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub user_id: Uuid,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Typed event payload. The storefront used to spread loose objects here;
/// named optional fields keep the template context honest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// A request to create and fan out a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    #[serde(default)]
    pub event: Option<String>,
    pub user: NotificationTarget,
    #[serde(default)]
    pub data: NotificationData,
}

/// Flat context handed to the template resolver, merged from the request's
/// `user` and `data` at the event boundary.
#[derive(Debug, Clone, Default)]
pub struct NotificationContext {
    pub user_id: Option<Uuid>,
    pub display_name: Option<String>,
    pub event: Option<String>,
    pub amount: Option<String>,
    pub order_id: Option<String>,
    pub plan: Option<String>,
    pub link: Option<String>,
}

impl NotificationContext {
    pub fn from_request(request: &NotificationRequest) -> Self {
        Self {
            user_id: Some(request.user.user_id),
            display_name: request.user.display_name.clone(),
            event: request.event.clone(),
            amount: request.data.amount.clone(),
            order_id: request.data.order_id.clone(),
            plan: request.data.plan.clone(),
            link: request.data.link.clone(),
        }
    }
}

/// Rendered notification text, produced by a template resolver.
#[derive(Debug, Clone)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub link: String,
}
