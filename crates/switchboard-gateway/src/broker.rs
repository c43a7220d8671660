use anyhow::Context;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use switchboard_db::models::MessageRow;
use switchboard_types::events::{ServerEvent, UnreadScope};
use switchboard_types::models::{ChatMessage, MessageStatus, RoomId, RoomKind, Session};

use crate::error::{HubError, blocking_join};
use crate::hub::Hub;

fn can_mutate(session: &Session, sender_id: Option<Uuid>) -> bool {
    session.is_admin() || (session.user_id.is_some() && session.user_id == sender_id)
}

impl Hub {
    /// Persist a message and broadcast the stored row. The broadcast always
    /// carries the canonical server-side id and timestamps, never the raw
    /// client input, and goes out only after the write completed.
    pub async fn send_message(
        &self,
        connection_id: Uuid,
        kind: RoomKind,
        conversation_id: Uuid,
        text: String,
    ) -> Result<(), HubError> {
        let body = text.trim().to_string();
        if body.is_empty() {
            return Err(HubError::Invalid("empty message"));
        }
        let session = self.session(connection_id)?;

        // The conversation's owner is the message recipient.
        let db = self.db.clone();
        let id = conversation_id.to_string();
        let conversation = tokio::task::spawn_blocking(move || db.find_conversation(kind, &id))
            .await
            .map_err(blocking_join)??
            .ok_or(HubError::Invalid("unknown conversation"))?;

        let recipient_id: Option<Uuid> = conversation
            .owner_id
            .map(|raw| raw.parse().context("corrupt conversation owner id"))
            .transpose()?;

        let now = Utc::now();
        let message = ChatMessage {
            id: Uuid::new_v4(),
            room_kind: kind,
            conversation_id,
            sender_id: session.user_id,
            recipient_id,
            body,
            sender_is_admin: session.is_admin(),
            status: MessageStatus::Sent,
            created_at: now,
            updated_at: now,
        };

        let db = self.db.clone();
        let row = MessageRow::from_chat_message(&message);
        tokio::task::spawn_blocking(move || db.insert_message(&row))
            .await
            .map_err(blocking_join)??;

        self.presence.send_to_room(
            RoomId::new(kind, conversation_id),
            &ServerEvent::ReceiveMessage { message },
        );
        Ok(())
    }

    /// Replace a message body. Allowed for the original sender or an admin;
    /// anyone else gets a silent no-op with zero writes and zero broadcasts.
    pub async fn edit_message(
        &self,
        connection_id: Uuid,
        kind: RoomKind,
        conversation_id: Uuid,
        message_id: Uuid,
        text: String,
    ) -> Result<(), HubError> {
        let body = text.trim().to_string();
        if body.is_empty() {
            return Err(HubError::Invalid("empty message"));
        }
        let session = self.session(connection_id)?;
        let stored = self.load_message(message_id).await?;

        if stored.room_kind != kind || stored.conversation_id != conversation_id {
            return Err(HubError::Invalid("conversation mismatch"));
        }
        if !can_mutate(&session, stored.sender_id) {
            return Err(HubError::Forbidden("not the message sender"));
        }
        // Deleted is terminal for content.
        if stored.status == MessageStatus::Deleted {
            return Err(HubError::Invalid("message is deleted"));
        }

        let now = Utc::now();
        let db = self.db.clone();
        let id = message_id.to_string();
        let stored_body = body.clone();
        let updated_at = now.to_rfc3339();
        tokio::task::spawn_blocking(move || db.edit_message(&id, &stored_body, &updated_at))
            .await
            .map_err(blocking_join)??;

        let message = ChatMessage {
            body,
            status: MessageStatus::Edited,
            updated_at: now,
            ..stored
        };
        self.presence.send_to_room(
            RoomId::new(kind, conversation_id),
            &ServerEvent::MessageEdited { message },
        );
        Ok(())
    }

    /// Soft delete: the row keeps existing with `status = deleted` so badges
    /// and references stay consistent. Broadcast carries only the id.
    pub async fn delete_message(
        &self,
        connection_id: Uuid,
        kind: RoomKind,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> Result<(), HubError> {
        let session = self.session(connection_id)?;
        let stored = self.load_message(message_id).await?;

        if stored.room_kind != kind || stored.conversation_id != conversation_id {
            return Err(HubError::Invalid("conversation mismatch"));
        }
        if !can_mutate(&session, stored.sender_id) {
            return Err(HubError::Forbidden("not the message sender"));
        }
        if stored.status == MessageStatus::Deleted {
            // Already gone; repeating the delete changes nothing.
            return Ok(());
        }

        let db = self.db.clone();
        let id = message_id.to_string();
        let updated_at = Utc::now().to_rfc3339();
        tokio::task::spawn_blocking(move || {
            db.set_message_status(&id, MessageStatus::Deleted, &updated_at)
        })
        .await
        .map_err(blocking_join)??;

        self.presence.send_to_room(
            RoomId::new(kind, conversation_id),
            &ServerEvent::MessageDeleted { message_id },
        );
        Ok(())
    }

    /// Bulk-mark the other side's messages as read, then push the reader's
    /// recomputed unread badge. Deleted messages never change status here.
    pub async fn mark_read(
        &self,
        connection_id: Uuid,
        kind: RoomKind,
        conversation_id: Uuid,
    ) -> Result<(), HubError> {
        let session = self.session(connection_id)?;
        // Admins read the user side; users and guests read the admin side.
        let other_side_is_admin = !session.is_admin();

        let db = self.db.clone();
        let id = conversation_id.to_string();
        let updated_at = Utc::now().to_rfc3339();
        let (updated, remaining) = tokio::task::spawn_blocking(move || {
            let updated = db.mark_conversation_read(kind, &id, other_side_is_admin, &updated_at)?;
            let remaining = db.unread_message_count(kind, &id, other_side_is_admin)?;
            Ok::<_, anyhow::Error>((updated, remaining))
        })
        .await
        .map_err(blocking_join)??;

        debug!(
            conversation = %conversation_id,
            updated,
            "conversation marked read"
        );

        let badge = ServerEvent::UnreadCount {
            scope: UnreadScope::Messages,
            conversation_id: Some(conversation_id),
            count: remaining,
        };
        match session.user_id {
            Some(user_id) => self.presence.send_to_user(user_id, &badge),
            None => self.presence.send_to_connection(connection_id, &badge),
        }
        Ok(())
    }

    async fn load_message(&self, message_id: Uuid) -> Result<ChatMessage, HubError> {
        let db = self.db.clone();
        let id = message_id.to_string();
        let row = tokio::task::spawn_blocking(move || db.get_message(&id))
            .await
            .map_err(blocking_join)??
            .ok_or(HubError::Invalid("unknown message"))?;
        Ok(row.into_chat_message()?)
    }
}
