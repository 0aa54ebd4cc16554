use chrono::{DateTime, Utc};
use rusqlite::Connection;
use studyhall_types::Rejection;
use studyhall_types::models::ChatMessage;
use uuid::Uuid;

use crate::models::{MessageRow, ts};
use crate::queries::groups::{is_participant, require_group};
use crate::{Database, Result};

const MAX_PAGE: u32 = 200;

/// Group chat is visible only to the group's participants.
fn require_member(conn: &Connection, group_id: Uuid, user_id: Uuid) -> Result<()> {
    require_group(conn, group_id)?;
    if !is_participant(conn, group_id, user_id)? {
        return Err(Rejection::permission_denied("only participants can use this group's chat").into());
    }
    Ok(())
}

pub fn send_message(
    conn: &Connection,
    group_id: Uuid,
    author_id: Uuid,
    content: &str,
    now: DateTime<Utc>,
) -> Result<ChatMessage> {
    require_member(conn, group_id, author_id)?;

    let id = Uuid::new_v4();
    let content = content.trim();
    conn.execute(
        "INSERT INTO chat_messages (id, group_id, author_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        (id.to_string(), group_id.to_string(), author_id.to_string(), content, ts(now)),
    )?;

    let author_username: String = conn.query_row(
        "SELECT username FROM users WHERE id = ?1",
        [author_id.to_string()],
        |row| row.get(0),
    )?;

    Ok(ChatMessage {
        id,
        group_id,
        author_id,
        author_username,
        content: content.to_string(),
        created_at: now,
    })
}

/// The most recent `limit` messages (optionally older than `before`), oldest first.
pub fn list_messages(
    conn: &Connection,
    group_id: Uuid,
    reader_id: Uuid,
    limit: u32,
    before: Option<DateTime<Utc>>,
) -> Result<Vec<ChatMessage>> {
    require_member(conn, group_id, reader_id)?;

    let mut stmt = conn.prepare(
        "SELECT m.id, m.group_id, m.author_id, u.username, m.content, m.created_at
         FROM chat_messages m
         JOIN users u ON u.id = m.author_id
         WHERE m.group_id = ?1 AND (?2 IS NULL OR m.created_at < ?2)
         ORDER BY m.created_at DESC
         LIMIT ?3",
    )?;
    let rows = stmt
        .query_map(
            rusqlite::params![group_id.to_string(), before.map(ts), limit.min(MAX_PAGE)],
            |row| {
                Ok(MessageRow {
                    id: row.get(0)?,
                    group_id: row.get(1)?,
                    author_id: row.get(2)?,
                    author_username: row.get(3)?,
                    content: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut messages = rows
        .into_iter()
        .map(ChatMessage::try_from)
        .collect::<Result<Vec<_>>>()?;
    messages.reverse();
    Ok(messages)
}

impl Database {
    pub fn send_message(
        &self,
        group_id: Uuid,
        author_id: Uuid,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage> {
        self.with_tx(|tx| send_message(tx, group_id, author_id, content, now))
    }

    pub fn list_messages(
        &self,
        group_id: Uuid,
        reader_id: Uuid,
        limit: u32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| list_messages(conn, group_id, reader_id, limit, before))
    }
}
