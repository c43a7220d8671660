/// Integration tests: drive the hub end-to-end over in-memory channels and an
/// in-memory database, the same way the WebSocket layer drives it, and verify
/// what each connected session observes.
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use switchboard_db::Database;
use switchboard_gateway::hub::Hub;
use switchboard_gateway::notify::TemplateResolver;
use switchboard_types::events::{ClientCommand, ServerEvent};
use switchboard_types::models::{
    MessageStatus, NotificationContent, NotificationContext, NotificationData, NotificationKind,
    NotificationRequest, NotificationTarget, Role, RoomKind, Session,
};

struct StubTemplates;

impl TemplateResolver for StubTemplates {
    fn render(
        &self,
        kind: NotificationKind,
        role: Role,
        _context: &NotificationContext,
    ) -> NotificationContent {
        NotificationContent {
            title: format!("{:?}", kind),
            body: format!("for {:?}", role),
            link: String::new(),
        }
    }
}

fn test_hub() -> (Hub, Arc<Database>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let hub = Hub::new(db.clone(), Arc::new(StubTemplates));
    (hub, db)
}

fn connect(
    hub: &Hub,
    role: Role,
    user_id: Option<Uuid>,
    name: &str,
) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = Session {
        connection_id: Uuid::new_v4(),
        user_id,
        role,
        display_name: name.into(),
        locale: "en".into(),
    };
    let connection_id = session.connection_id;
    hub.connect(session, tx);

    // Swallow the ready greeting; the tests below care about what follows.
    match rx.try_recv() {
        Ok(ServerEvent::Ready { .. }) => {}
        other => panic!("expected ready, got {:?}", other),
    }

    (connection_id, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn notification_request(kind: NotificationKind, user_id: Uuid) -> NotificationRequest {
    NotificationRequest {
        kind,
        event: None,
        user: NotificationTarget {
            user_id,
            display_name: Some("Maya".into()),
        },
        data: NotificationData::default(),
    }
}

#[tokio::test]
async fn join_disconnect_and_send_scenario() {
    let (hub, db) = test_hub();

    let owner = Uuid::new_v4();
    let conversation = Uuid::new_v4();
    db.create_conversation(RoomKind::Live, &conversation.to_string(), Some(&owner.to_string()))
        .unwrap();

    let (u1, mut rx1) = connect(&hub, Role::User, Some(owner), "U1");
    let (u2, mut rx2) = connect(&hub, Role::User, Some(Uuid::new_v4()), "U2");

    hub.handle_command(
        u1,
        ClientCommand::JoinRoom {
            room_kind: RoomKind::Live,
            conversation_id: conversation,
        },
    )
    .await;
    hub.handle_command(
        u2,
        ClientCommand::JoinRoom {
            room_kind: RoomKind::Live,
            conversation_id: conversation,
        },
    )
    .await;

    // After the second join both sessions see a 2-member snapshot.
    let last_update = drain(&mut rx1)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::RoomUsersUpdate { members, .. } => Some(members),
            _ => None,
        })
        .last()
        .expect("U1 saw a membership update");
    assert_eq!(last_update.len(), 2);

    // U2 disconnects; U1 sees the room shrink to 1.
    hub.disconnect(u2);
    drop(rx2);
    let after_disconnect = drain(&mut rx1)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::RoomUsersUpdate { members, .. } => Some(members),
            _ => None,
        })
        .last()
        .expect("U1 saw the disconnect update");
    assert_eq!(after_disconnect.len(), 1);
    assert_eq!(after_disconnect[0].connection_id, u1);

    // U1 sends a message and observes the canonical stored row.
    hub.handle_command(
        u1,
        ClientCommand::SendMessage {
            room_kind: RoomKind::Live,
            conversation_id: conversation,
            text: "Hello".into(),
        },
    )
    .await;

    let events = drain(&mut rx1);
    let message = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::ReceiveMessage { message } => Some(message.clone()),
            _ => None,
        })
        .expect("U1 received the message");
    assert_eq!(message.body, "Hello");
    assert_eq!(message.status, MessageStatus::Sent);
    assert_eq!(message.recipient_id, Some(owner));

    let stored = db.get_message(&message.id.to_string()).unwrap().unwrap();
    assert_eq!(stored.status, "sent");
}

#[tokio::test]
async fn sequential_sends_arrive_in_order() {
    let (hub, db) = test_hub();
    let conversation = Uuid::new_v4();
    db.create_conversation(RoomKind::Live, &conversation.to_string(), None)
        .unwrap();

    let (conn, mut rx) = connect(&hub, Role::User, Some(Uuid::new_v4()), "sender");
    hub.join_room(conn, RoomKind::Live, conversation).unwrap();
    drain(&mut rx);

    for text in ["a", "b", "c"] {
        hub.send_message(conn, RoomKind::Live, conversation, text.into())
            .await
            .unwrap();
    }

    let bodies: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::ReceiveMessage { message } => Some(message.body),
            _ => None,
        })
        .collect();
    assert_eq!(bodies, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn blank_messages_are_dropped() {
    let (hub, db) = test_hub();
    let conversation = Uuid::new_v4();
    db.create_conversation(RoomKind::Live, &conversation.to_string(), None)
        .unwrap();

    let (conn, mut rx) = connect(&hub, Role::User, Some(Uuid::new_v4()), "sender");
    hub.join_room(conn, RoomKind::Live, conversation).unwrap();
    drain(&mut rx);

    hub.handle_command(
        conn,
        ClientCommand::SendMessage {
            room_kind: RoomKind::Live,
            conversation_id: conversation,
            text: "   ".into(),
        },
    )
    .await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(
        db.unread_message_count(RoomKind::Live, &conversation.to_string(), false)
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn guest_support_room_goes_to_admins_and_creator_only() {
    let (hub, db) = test_hub();

    let (guest, mut guest_rx) = connect(&hub, Role::Guest, None, "Guest");
    let (_admin, mut admin_rx) = connect(&hub, Role::Admin, Some(Uuid::new_v4()), "Ana");
    let (_user, mut user_rx) = connect(&hub, Role::User, Some(Uuid::new_v4()), "Bo");

    hub.handle_command(guest, ClientCommand::CreateSupportRoom).await;

    // The creator gets the private ready reply.
    let guest_events = drain(&mut guest_rx);
    let conversation_id = guest_events
        .iter()
        .find_map(|e| match e {
            ServerEvent::SupportRoomReady { conversation_id } => Some(*conversation_id),
            _ => None,
        })
        .expect("creator got support_room_ready");

    // Admins learn about the room.
    assert!(drain(&mut admin_rx).iter().any(|e| matches!(
        e,
        ServerEvent::SupportRoomCreated { conversation_id: c, .. } if *c == conversation_id
    )));

    // Uninvolved users hear nothing.
    assert!(drain(&mut user_rx).is_empty());

    // The conversation is ownerless.
    let row = db
        .find_conversation(RoomKind::Bubble, &conversation_id.to_string())
        .unwrap()
        .expect("conversation persisted");
    assert!(row.owner_id.is_none());
}

#[tokio::test]
async fn stranger_edit_is_a_silent_noop() {
    let (hub, db) = test_hub();
    let conversation = Uuid::new_v4();
    db.create_conversation(RoomKind::Live, &conversation.to_string(), None)
        .unwrap();

    let (sender, mut sender_rx) = connect(&hub, Role::User, Some(Uuid::new_v4()), "sender");
    let (stranger, mut stranger_rx) = connect(&hub, Role::User, Some(Uuid::new_v4()), "stranger");
    hub.join_room(sender, RoomKind::Live, conversation).unwrap();
    hub.join_room(stranger, RoomKind::Live, conversation).unwrap();

    hub.send_message(sender, RoomKind::Live, conversation, "original".into())
        .await
        .unwrap();
    let message_id = drain(&mut sender_rx)
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::ReceiveMessage { message } => Some(message.id),
            _ => None,
        })
        .unwrap();
    drain(&mut stranger_rx);

    hub.handle_command(
        stranger,
        ClientCommand::EditMessage {
            room_kind: RoomKind::Live,
            conversation_id: conversation,
            message_id,
            text: "hijacked".into(),
        },
    )
    .await;

    // Zero broadcasts, zero writes.
    assert!(drain(&mut sender_rx).is_empty());
    assert!(drain(&mut stranger_rx).is_empty());
    let stored = db.get_message(&message_id.to_string()).unwrap().unwrap();
    assert_eq!(stored.body, "original");
    assert_eq!(stored.status, "sent");
}

#[tokio::test]
async fn admin_may_edit_and_delete_others_messages() {
    let (hub, db) = test_hub();
    let conversation = Uuid::new_v4();
    db.create_conversation(RoomKind::Live, &conversation.to_string(), None)
        .unwrap();

    let (sender, mut sender_rx) = connect(&hub, Role::User, Some(Uuid::new_v4()), "sender");
    let (admin, _admin_rx) = connect(&hub, Role::Admin, Some(Uuid::new_v4()), "Ana");
    hub.join_room(sender, RoomKind::Live, conversation).unwrap();
    drain(&mut sender_rx);

    hub.send_message(sender, RoomKind::Live, conversation, "typo".into())
        .await
        .unwrap();
    let message_id = drain(&mut sender_rx)
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::ReceiveMessage { message } => Some(message.id),
            _ => None,
        })
        .unwrap();

    hub.edit_message(admin, RoomKind::Live, conversation, message_id, "fixed".into())
        .await
        .unwrap();
    assert_eq!(
        db.get_message(&message_id.to_string()).unwrap().unwrap().body,
        "fixed"
    );

    hub.delete_message(admin, RoomKind::Live, conversation, message_id)
        .await
        .unwrap();
    let stored = db.get_message(&message_id.to_string()).unwrap().unwrap();
    assert_eq!(stored.status, "deleted");
    assert_eq!(stored.body, "fixed");
}

#[tokio::test]
async fn mark_read_never_resurrects_deleted_messages() {
    let (hub, db) = test_hub();
    let conversation = Uuid::new_v4();
    db.create_conversation(RoomKind::Live, &conversation.to_string(), None)
        .unwrap();

    let (admin, mut admin_rx) = connect(&hub, Role::Admin, Some(Uuid::new_v4()), "Ana");
    let (user, mut user_rx) = connect(&hub, Role::User, Some(Uuid::new_v4()), "Bo");
    hub.join_room(admin, RoomKind::Live, conversation).unwrap();
    hub.join_room(user, RoomKind::Live, conversation).unwrap();

    hub.send_message(admin, RoomKind::Live, conversation, "one".into())
        .await
        .unwrap();
    hub.send_message(admin, RoomKind::Live, conversation, "two".into())
        .await
        .unwrap();
    let ids: Vec<Uuid> = drain(&mut admin_rx)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::ReceiveMessage { message } => Some(message.id),
            _ => None,
        })
        .collect();
    assert_eq!(ids.len(), 2);

    hub.delete_message(admin, RoomKind::Live, conversation, ids[0])
        .await
        .unwrap();
    drain(&mut user_rx);

    // The user reads the admin side of the conversation.
    hub.mark_read(user, RoomKind::Live, conversation).await.unwrap();

    let deleted = db.get_message(&ids[0].to_string()).unwrap().unwrap();
    let read = db.get_message(&ids[1].to_string()).unwrap().unwrap();
    assert_eq!(deleted.status, "deleted");
    assert_eq!(read.status, "read");

    // The reader got a zero badge for this conversation.
    assert!(drain(&mut user_rx).iter().any(|e| matches!(
        e,
        ServerEvent::UnreadCount { count: 0, conversation_id: Some(c), .. } if *c == conversation
    )));
}

#[tokio::test]
async fn fanout_for_both_creates_one_row_per_recipient() {
    let (hub, db) = test_hub();

    let admin_a = Uuid::new_v4();
    let admin_b = Uuid::new_v4();
    let customer = Uuid::new_v4();
    db.create_user(&admin_a.to_string(), "Ana", "admin", "en").unwrap();
    db.create_user(&admin_b.to_string(), "Bo", "admin", "en").unwrap();
    db.create_user(&customer.to_string(), "Maya", "user", "en").unwrap();

    // Only one admin is online; persistence must not care.
    let (_conn, mut online_admin_rx) = connect(&hub, Role::Admin, Some(admin_a), "Ana");

    hub.create_for_both(notification_request(NotificationKind::Payment, customer))
        .await
        .unwrap();

    // 2 admin rows + 1 user row.
    assert_eq!(db.unread_notification_count(&admin_a.to_string()).unwrap(), 1);
    assert_eq!(db.unread_notification_count(&admin_b.to_string()).unwrap(), 1);
    assert_eq!(db.unread_notification_count(&customer.to_string()).unwrap(), 1);

    // The online admin got a live push and a badge update.
    let events = drain(&mut online_admin_rx);
    assert!(events.iter().any(|e| matches!(e, ServerEvent::NotificationCreated { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::UnreadCount { count: 1, .. }
    )));
}

#[tokio::test]
async fn delete_conversation_requires_ownership() {
    let (hub, db) = test_hub();
    let owner = Uuid::new_v4();
    let conversation = Uuid::new_v4();
    db.create_conversation(RoomKind::Live, &conversation.to_string(), Some(&owner.to_string()))
        .unwrap();

    let (stranger, mut stranger_rx) = connect(&hub, Role::User, Some(Uuid::new_v4()), "stranger");

    hub.handle_command(
        stranger,
        ClientCommand::DeleteConversation {
            room_kind: RoomKind::Live,
            conversation_id: conversation,
        },
    )
    .await;

    // Still there, nobody told anybody anything.
    assert!(db
        .find_conversation(RoomKind::Live, &conversation.to_string())
        .unwrap()
        .is_some());
    assert!(drain(&mut stranger_rx).is_empty());

    // The owner can delete it, and everyone hears the list refresh.
    let (owner_conn, mut owner_rx) = connect(&hub, Role::User, Some(owner), "owner");
    hub.delete_conversation(owner_conn, RoomKind::Live, conversation)
        .await
        .unwrap();
    assert!(db
        .find_conversation(RoomKind::Live, &conversation.to_string())
        .unwrap()
        .is_none());
    assert!(drain(&mut owner_rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::RefreshConversationLists)));
    assert!(drain(&mut stranger_rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::RefreshConversationLists)));
}

#[tokio::test]
async fn typing_reaches_everyone_else_in_the_room() {
    let (hub, _db) = test_hub();
    let conversation = Uuid::new_v4();

    let (typist, mut typist_rx) = connect(&hub, Role::User, Some(Uuid::new_v4()), "typist");
    let (watcher, mut watcher_rx) = connect(&hub, Role::Admin, Some(Uuid::new_v4()), "watcher");
    hub.join_room(typist, RoomKind::Bubble, conversation).unwrap();
    hub.join_room(watcher, RoomKind::Bubble, conversation).unwrap();
    drain(&mut typist_rx);
    drain(&mut watcher_rx);

    hub.typing(typist, RoomKind::Bubble, conversation, true).unwrap();

    assert!(drain(&mut watcher_rx).iter().any(|e| matches!(
        e,
        ServerEvent::UserTyping { is_typing: true, .. }
    )));
    assert!(drain(&mut typist_rx).is_empty());
}
