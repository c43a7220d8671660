use anyhow::Context;
use tracing::info;
use uuid::Uuid;

use switchboard_types::events::ServerEvent;
use switchboard_types::models::{RoomId, RoomKind, RoomMember};

use crate::error::{HubError, blocking_join};
use crate::hub::Hub;

impl Hub {
    /// Idempotent join. Every current member, the joiner included, receives a
    /// fresh full-member snapshot (last write wins, no diffs).
    pub fn join_room(
        &self,
        connection_id: Uuid,
        kind: RoomKind,
        conversation_id: Uuid,
    ) -> Result<(), HubError> {
        let room = RoomId::new(kind, conversation_id);
        let members = self
            .presence
            .join_room(room, connection_id)
            .ok_or(HubError::Invalid("unknown connection"))?;

        self.presence.send_to_room(
            room,
            &ServerEvent::RoomUsersUpdate {
                conversation_id,
                members,
            },
        );
        Ok(())
    }

    pub fn leave_room(
        &self,
        connection_id: Uuid,
        kind: RoomKind,
        conversation_id: Uuid,
    ) -> Result<(), HubError> {
        let room = RoomId::new(kind, conversation_id);
        // Leaving a room nobody is in is a quiet no-op.
        let Some(members) = self.presence.leave_room(room, connection_id) else {
            return Ok(());
        };

        self.presence.send_to_room(
            room,
            &ServerEvent::RoomUsersUpdate {
                conversation_id,
                members,
            },
        );
        Ok(())
    }

    /// Open a new widget conversation. Guests create ownerless conversations;
    /// signed-in users own theirs. Admins learn about the new room through a
    /// presence-wide notice, the creator through a private reply.
    pub async fn create_support_room(&self, connection_id: Uuid) -> Result<(), HubError> {
        let session = self.session(connection_id)?;
        let conversation_id = Uuid::new_v4();

        let db = self.db.clone();
        let id = conversation_id.to_string();
        let owner = session.user_id.map(|u| u.to_string());
        tokio::task::spawn_blocking(move || {
            db.create_conversation(RoomKind::Bubble, &id, owner.as_deref())
        })
        .await
        .map_err(blocking_join)??;

        let room = RoomId::new(RoomKind::Bubble, conversation_id);
        self.presence.join_room(room, connection_id);

        info!(
            conversation = %conversation_id,
            creator = %session.display_name,
            "support room created"
        );

        self.presence.send_to_admins(&ServerEvent::SupportRoomCreated {
            conversation_id,
            creator: RoomMember::from(&session),
        });
        self.presence
            .send_to_connection(connection_id, &ServerEvent::SupportRoomReady { conversation_id });
        Ok(())
    }

    /// Remove a conversation and everything in it. Only the owner or an admin
    /// may do this; anyone else gets a silent no-op.
    pub async fn delete_conversation(
        &self,
        connection_id: Uuid,
        kind: RoomKind,
        conversation_id: Uuid,
    ) -> Result<(), HubError> {
        let session = self.session(connection_id)?;

        let db = self.db.clone();
        let id = conversation_id.to_string();
        let conversation = tokio::task::spawn_blocking(move || db.find_conversation(kind, &id))
            .await
            .map_err(blocking_join)??
            .ok_or(HubError::Invalid("unknown conversation"))?;

        let owner_id: Option<Uuid> = conversation
            .owner_id
            .map(|raw| raw.parse().context("corrupt conversation owner id"))
            .transpose()?;

        let authorized =
            session.is_admin() || (session.user_id.is_some() && session.user_id == owner_id);
        if !authorized {
            return Err(HubError::Forbidden("not the conversation owner"));
        }

        let db = self.db.clone();
        let id = conversation_id.to_string();
        tokio::task::spawn_blocking(move || db.delete_conversation(kind, &id))
            .await
            .map_err(blocking_join)??;

        info!(conversation = %conversation_id, "conversation deleted");

        let room = RoomId::new(kind, conversation_id);
        self.presence
            .send_to_room(room, &ServerEvent::ConversationDeleted { conversation_id });
        // List views elsewhere are not room-scoped.
        self.presence.broadcast_all(&ServerEvent::RefreshConversationLists);
        Ok(())
    }

    /// Relay a typing indicator to the rest of the room.
    pub fn typing(
        &self,
        connection_id: Uuid,
        kind: RoomKind,
        conversation_id: Uuid,
        is_typing: bool,
    ) -> Result<(), HubError> {
        let session = self.session(connection_id)?;
        let room = RoomId::new(kind, conversation_id);

        self.presence.send_to_room_except(
            room,
            connection_id,
            &ServerEvent::UserTyping {
                conversation_id,
                is_typing,
                who: RoomMember::from(&session),
            },
        );
        Ok(())
    }

    pub fn set_locale(&self, connection_id: Uuid, locale: &str) -> Result<(), HubError> {
        let locale = locale.trim();
        if locale.is_empty() {
            return Err(HubError::Invalid("empty locale"));
        }
        self.presence.set_locale(connection_id, locale);
        Ok(())
    }
}
