use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            display_name    TEXT NOT NULL,
            role            TEXT NOT NULL DEFAULT 'user',
            locale          TEXT NOT NULL DEFAULT 'en',
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_users_role
            ON users(role);

        CREATE TABLE IF NOT EXISTS live_conversations (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Widget conversations may be ownerless: anonymous visitors have no
        -- user row.
        CREATE TABLE IF NOT EXISTS bubble_conversations (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            room_kind       TEXT NOT NULL,
            conversation_id TEXT NOT NULL,
            sender_id       TEXT,
            recipient_id    TEXT,
            body            TEXT NOT NULL,
            sender_is_admin INTEGER NOT NULL DEFAULT 0,
            status          TEXT NOT NULL DEFAULT 'sent',
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(room_kind, conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id                  TEXT PRIMARY KEY,
            recipient_user_id   TEXT NOT NULL,
            kind                TEXT NOT NULL,
            title               TEXT NOT NULL,
            body                TEXT NOT NULL,
            link                TEXT NOT NULL DEFAULT '',
            is_read             INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_recipient
            ON notifications(recipient_user_id, is_read);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
