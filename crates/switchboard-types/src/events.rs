use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ChatMessage, Notification, NotificationRequest, Role, RoomKind, RoomMember,
};

/// Commands sent FROM client TO hub over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Enter a room; idempotent.
    JoinRoom {
        room_kind: RoomKind,
        conversation_id: Uuid,
    },

    /// Leave a room previously joined.
    LeaveRoom {
        room_kind: RoomKind,
        conversation_id: Uuid,
    },

    /// Open a new anonymous support conversation. Identity comes from the
    /// session, so the command carries no payload.
    CreateSupportRoom,

    /// Remove a conversation and all its messages. Owner or admin only.
    DeleteConversation {
        room_kind: RoomKind,
        conversation_id: Uuid,
    },

    SendMessage {
        room_kind: RoomKind,
        conversation_id: Uuid,
        text: String,
    },

    EditMessage {
        room_kind: RoomKind,
        conversation_id: Uuid,
        message_id: Uuid,
        text: String,
    },

    DeleteMessage {
        room_kind: RoomKind,
        conversation_id: Uuid,
        message_id: Uuid,
    },

    /// Mark every message from the other side of the conversation as read.
    MarkRead {
        room_kind: RoomKind,
        conversation_id: Uuid,
    },

    Typing {
        room_kind: RoomKind,
        conversation_id: Uuid,
        is_typing: bool,
    },

    SetLocale {
        locale: String,
    },

    CreateNotificationForUser(NotificationRequest),
    CreateNotificationForAdmin(NotificationRequest),
    CreateNotificationForBoth(NotificationRequest),
}

/// Events sent FROM hub TO clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once, immediately after the session is registered.
    Ready {
        connection_id: Uuid,
        user_id: Option<Uuid>,
        role: Role,
        display_name: String,
        locale: String,
    },

    /// Full member snapshot for a room, re-sent on every join/leave/disconnect.
    RoomUsersUpdate {
        conversation_id: Uuid,
        members: Vec<RoomMember>,
    },

    /// A new support conversation exists; delivered to every connected admin.
    SupportRoomCreated {
        conversation_id: Uuid,
        creator: RoomMember,
    },

    /// Private reply to the creator of a support conversation.
    SupportRoomReady { conversation_id: Uuid },

    ConversationDeleted { conversation_id: Uuid },

    /// Conversation list views elsewhere are not room-scoped, so deletion
    /// also tells everyone to refetch.
    RefreshConversationLists,

    ReceiveMessage { message: ChatMessage },

    MessageEdited { message: ChatMessage },

    MessageDeleted { message_id: Uuid },

    UserTyping {
        conversation_id: Uuid,
        is_typing: bool,
        who: RoomMember,
    },

    /// Delivered to the target user of a notification.
    NotificationReceived { notification: Notification },

    /// Delivered to admin recipients of a notification.
    NotificationCreated { notification: Notification },

    /// Recomputed unread badge for the receiving user.
    UnreadCount {
        scope: UnreadScope,
        conversation_id: Option<Uuid>,
        count: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnreadScope {
    Messages,
    Notifications,
}
