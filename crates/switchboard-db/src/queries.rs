use crate::Database;
use crate::models::{ConversationRow, MessageRow, NotificationRow, UserRow, room_kind_str};
use anyhow::Result;
use rusqlite::Connection;
use switchboard_types::models::{MessageStatus, RoomKind};

/// The live and bubble surfaces persist into separate conversation tables.
/// The kind is resolved to a table exactly once, here, instead of inline
/// conditionals scattered through the hub.
fn conversations_table(kind: RoomKind) -> &'static str {
    match kind {
        RoomKind::Live => "live_conversations",
        RoomKind::Bubble => "bubble_conversations",
    }
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, display_name: &str, role: &str, locale: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, role, locale) VALUES (?1, ?2, ?3, ?4)",
                (id, display_name, role, locale),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_admin_user_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM users WHERE role = 'admin'")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    // -- Conversations --

    pub fn create_conversation(
        &self,
        kind: RoomKind,
        id: &str,
        owner_id: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (id, owner_id) VALUES (?1, ?2)",
                    conversations_table(kind)
                ),
                (id, owner_id),
            )?;
            Ok(())
        })
    }

    pub fn find_conversation(&self, kind: RoomKind, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, owner_id, created_at FROM {} WHERE id = ?1",
                conversations_table(kind)
            ))?;

            let row = stmt
                .query_row([id], |row| {
                    Ok(ConversationRow {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    /// Deletes the conversation and every message in it. The connection mutex
    /// serializes both statements.
    pub fn delete_conversation(&self, kind: RoomKind, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM messages WHERE room_kind = ?1 AND conversation_id = ?2",
                (room_kind_str(kind), id),
            )?;
            conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", conversations_table(kind)),
                [id],
            )?;
            Ok(())
        })
    }

    // -- Messages --

    pub fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (id, room_kind, conversation_id, sender_id, recipient_id,
                     body, sender_is_admin, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    row.id,
                    row.room_kind,
                    row.conversation_id,
                    row.sender_id,
                    row.recipient_id,
                    row.body,
                    row.sender_is_admin,
                    row.status,
                    row.created_at,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, room_kind, conversation_id, sender_id, recipient_id,
                        body, sender_is_admin, status, created_at, updated_at
                 FROM messages WHERE id = ?1",
            )?;

            let row = stmt
                .query_row([id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        room_kind: row.get(1)?,
                        conversation_id: row.get(2)?,
                        sender_id: row.get(3)?,
                        recipient_id: row.get(4)?,
                        body: row.get(5)?,
                        sender_is_admin: row.get(6)?,
                        status: row.get(7)?,
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    /// Replace a message body and mark it edited.
    pub fn edit_message(&self, id: &str, body: &str, updated_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET body = ?2, status = 'edited', updated_at = ?3 WHERE id = ?1",
                (id, body, updated_at),
            )?;
            Ok(())
        })
    }

    pub fn set_message_status(&self, id: &str, status: MessageStatus, updated_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET status = ?2, updated_at = ?3 WHERE id = ?1",
                (id, status.as_str(), updated_at),
            )?;
            Ok(())
        })
    }

    /// Bulk-mark the other side's messages as read. Deleted messages are
    /// excluded from the predicate so a read sweep never resurrects one.
    /// Returns the number of rows updated; running it twice updates zero.
    pub fn mark_conversation_read(
        &self,
        kind: RoomKind,
        conversation_id: &str,
        from_admin: bool,
        updated_at: &str,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET status = 'read', updated_at = ?4
                 WHERE room_kind = ?1 AND conversation_id = ?2
                   AND sender_is_admin = ?3
                   AND status NOT IN ('read', 'deleted')",
                rusqlite::params![room_kind_str(kind), conversation_id, from_admin, updated_at],
            )?;
            Ok(updated)
        })
    }

    pub fn unread_message_count(
        &self,
        kind: RoomKind,
        conversation_id: &str,
        from_admin: bool,
    ) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE room_kind = ?1 AND conversation_id = ?2
                   AND sender_is_admin = ?3
                   AND status NOT IN ('read', 'deleted')",
                rusqlite::params![room_kind_str(kind), conversation_id, from_admin],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Notifications --

    pub fn insert_notification(&self, row: &NotificationRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications
                    (id, recipient_user_id, kind, title, body, link, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    row.id,
                    row.recipient_user_id,
                    row.kind,
                    row.title,
                    row.body,
                    row.link,
                    row.is_read,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn unread_notification_count(&self, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications
                 WHERE recipient_user_id = ?1 AND is_read = 0",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT id, display_name, role, locale, created_at FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                display_name: row.get(1)?,
                role: row.get(2)?,
                locale: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRow;
    use uuid::Uuid;

    fn message_row(conversation_id: &str, from_admin: bool, status: &str) -> MessageRow {
        let now = chrono::Utc::now().to_rfc3339();
        MessageRow {
            id: Uuid::new_v4().to_string(),
            room_kind: "live".into(),
            conversation_id: conversation_id.into(),
            sender_id: Some(Uuid::new_v4().to_string()),
            recipient_id: None,
            body: "hello".into(),
            sender_is_admin: from_admin,
            status: status.into(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn soft_delete_keeps_the_row() {
        let db = Database::open_in_memory().unwrap();
        let row = message_row("c1", false, "sent");
        let id = row.id.clone();
        db.insert_message(&row).unwrap();

        let now = chrono::Utc::now().to_rfc3339();
        db.set_message_status(&id, MessageStatus::Deleted, &now).unwrap();

        let stored = db.get_message(&id).unwrap().expect("row still present");
        assert_eq!(stored.status, "deleted");
        assert_eq!(stored.body, "hello");
    }

    #[test]
    fn mark_read_skips_deleted_and_own_side() {
        let db = Database::open_in_memory().unwrap();
        let from_admin = message_row("c1", true, "sent");
        let deleted = {
            let mut m = message_row("c1", true, "deleted");
            m.body = "gone".into();
            m
        };
        let from_user = message_row("c1", false, "sent");
        db.insert_message(&from_admin).unwrap();
        db.insert_message(&deleted).unwrap();
        db.insert_message(&from_user).unwrap();

        // A user reads the admin side of the conversation.
        let now = chrono::Utc::now().to_rfc3339();
        let updated = db.mark_conversation_read(RoomKind::Live, "c1", true, &now).unwrap();
        assert_eq!(updated, 1);

        assert_eq!(db.get_message(&from_admin.id).unwrap().unwrap().status, "read");
        assert_eq!(db.get_message(&deleted.id).unwrap().unwrap().status, "deleted");
        assert_eq!(db.get_message(&from_user.id).unwrap().unwrap().status, "sent");

        // Second sweep is a no-op.
        let again = db.mark_conversation_read(RoomKind::Live, "c1", true, &now).unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn unread_count_decreases_monotonically() {
        let db = Database::open_in_memory().unwrap();
        for _ in 0..3 {
            db.insert_message(&message_row("c2", true, "sent")).unwrap();
        }

        let before = db.unread_message_count(RoomKind::Live, "c2", true).unwrap();
        assert_eq!(before, 3);

        let now = chrono::Utc::now().to_rfc3339();
        db.mark_conversation_read(RoomKind::Live, "c2", true, &now).unwrap();

        let after = db.unread_message_count(RoomKind::Live, "c2", true).unwrap();
        assert_eq!(after, 0);
    }

    #[test]
    fn conversation_delete_cascades_messages() {
        let db = Database::open_in_memory().unwrap();
        let conversation_id = Uuid::new_v4().to_string();
        db.create_conversation(RoomKind::Bubble, &conversation_id, None).unwrap();

        let mut row = message_row(&conversation_id, false, "sent");
        row.room_kind = "bubble".into();
        db.insert_message(&row).unwrap();

        db.delete_conversation(RoomKind::Bubble, &conversation_id).unwrap();

        assert!(db.find_conversation(RoomKind::Bubble, &conversation_id).unwrap().is_none());
        assert!(db.get_message(&row.id).unwrap().is_none());
    }

    #[test]
    fn conversations_are_scoped_by_kind() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4().to_string();
        db.create_conversation(RoomKind::Live, &id, Some("u1")).unwrap();

        assert!(db.find_conversation(RoomKind::Live, &id).unwrap().is_some());
        assert!(db.find_conversation(RoomKind::Bubble, &id).unwrap().is_none());
    }

    #[test]
    fn admin_listing() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("a1", "Ana", "admin", "en").unwrap();
        db.create_user("a2", "Bo", "admin", "fr").unwrap();
        db.create_user("u1", "Cy", "user", "en").unwrap();

        let mut admins = db.list_admin_user_ids().unwrap();
        admins.sort();
        assert_eq!(admins, vec!["a1".to_string(), "a2".to_string()]);
    }
}
