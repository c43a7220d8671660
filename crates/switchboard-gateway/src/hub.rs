use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use switchboard_db::Database;
use switchboard_types::events::{ClientCommand, ServerEvent};
use switchboard_types::models::Session;

use crate::error::{HubError, report};
use crate::notify::TemplateResolver;
use crate::presence::PresenceRegistry;

/// Shared hub state: the presence registry, the persistence handle and the
/// notification template resolver. Cheap to clone; one instance serves every
/// connection in the process.
#[derive(Clone)]
pub struct Hub {
    pub(crate) db: Arc<Database>,
    pub(crate) presence: Arc<PresenceRegistry>,
    pub(crate) templates: Arc<dyn TemplateResolver>,
}

impl Hub {
    pub fn new(db: Arc<Database>, templates: Arc<dyn TemplateResolver>) -> Self {
        Self {
            db,
            presence: Arc::new(PresenceRegistry::new()),
            templates,
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    /// Register a freshly resolved session and greet it with `ready`.
    pub fn connect(&self, session: Session, tx: mpsc::UnboundedSender<ServerEvent>) {
        let ready = ServerEvent::Ready {
            connection_id: session.connection_id,
            user_id: session.user_id,
            role: session.role,
            display_name: session.display_name.clone(),
            locale: session.locale.clone(),
        };
        let connection_id = session.connection_id;
        self.presence.register(session, tx);
        self.presence.send_to_connection(connection_id, &ready);
    }

    /// Tear down a session and re-broadcast membership for every room it
    /// occupied, so no client keeps a stale member list.
    pub fn disconnect(&self, connection_id: Uuid) {
        for (room, members) in self.presence.unregister(connection_id) {
            self.presence.send_to_room(
                room,
                &ServerEvent::RoomUsersUpdate {
                    conversation_id: room.conversation_id,
                    members,
                },
            );
        }
    }

    /// Single entry point for client commands. Failures are classified and
    /// swallowed at the reporting seam; nothing propagates to the socket loop.
    pub async fn handle_command(&self, connection_id: Uuid, command: ClientCommand) {
        let op = op_name(&command);
        let result = match command {
            ClientCommand::JoinRoom {
                room_kind,
                conversation_id,
            } => self.join_room(connection_id, room_kind, conversation_id),

            ClientCommand::LeaveRoom {
                room_kind,
                conversation_id,
            } => self.leave_room(connection_id, room_kind, conversation_id),

            ClientCommand::CreateSupportRoom => self.create_support_room(connection_id).await,

            ClientCommand::DeleteConversation {
                room_kind,
                conversation_id,
            } => {
                self.delete_conversation(connection_id, room_kind, conversation_id)
                    .await
            }

            ClientCommand::SendMessage {
                room_kind,
                conversation_id,
                text,
            } => {
                self.send_message(connection_id, room_kind, conversation_id, text)
                    .await
            }

            ClientCommand::EditMessage {
                room_kind,
                conversation_id,
                message_id,
                text,
            } => {
                self.edit_message(connection_id, room_kind, conversation_id, message_id, text)
                    .await
            }

            ClientCommand::DeleteMessage {
                room_kind,
                conversation_id,
                message_id,
            } => {
                self.delete_message(connection_id, room_kind, conversation_id, message_id)
                    .await
            }

            ClientCommand::MarkRead {
                room_kind,
                conversation_id,
            } => self.mark_read(connection_id, room_kind, conversation_id).await,

            ClientCommand::Typing {
                room_kind,
                conversation_id,
                is_typing,
            } => self.typing(connection_id, room_kind, conversation_id, is_typing),

            ClientCommand::SetLocale { locale } => self.set_locale(connection_id, &locale),

            ClientCommand::CreateNotificationForUser(request) => {
                self.create_for_user(request).await
            }
            ClientCommand::CreateNotificationForAdmin(request) => {
                self.create_for_admins(request).await
            }
            ClientCommand::CreateNotificationForBoth(request) => {
                self.create_for_both(request).await
            }
        };

        if let Err(err) = result {
            report(op, &err);
        }
    }

    pub(crate) fn session(&self, connection_id: Uuid) -> Result<Session, HubError> {
        self.presence
            .session(connection_id)
            .ok_or(HubError::Invalid("unknown connection"))
    }
}

fn op_name(command: &ClientCommand) -> &'static str {
    match command {
        ClientCommand::JoinRoom { .. } => "join_room",
        ClientCommand::LeaveRoom { .. } => "leave_room",
        ClientCommand::CreateSupportRoom => "create_support_room",
        ClientCommand::DeleteConversation { .. } => "delete_conversation",
        ClientCommand::SendMessage { .. } => "send_message",
        ClientCommand::EditMessage { .. } => "edit_message",
        ClientCommand::DeleteMessage { .. } => "delete_message",
        ClientCommand::MarkRead { .. } => "mark_read",
        ClientCommand::Typing { .. } => "typing",
        ClientCommand::SetLocale { .. } => "set_locale",
        ClientCommand::CreateNotificationForUser(_) => "create_notification_for_user",
        ClientCommand::CreateNotificationForAdmin(_) => "create_notification_for_admin",
        ClientCommand::CreateNotificationForBoth(_) => "create_notification_for_both",
    }
}
