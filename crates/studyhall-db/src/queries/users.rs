use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use studyhall_types::Rejection;
use studyhall_types::models::User;
use uuid::Uuid;

use crate::models::{UserRow, ts};
use crate::{Database, Result};

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<User> {
    if get_user_by_username(conn, username)?.is_some() {
        return Err(Rejection::conflict("username is already taken").into());
    }

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO users (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
        (id.to_string(), username, password_hash, ts(now)),
    )?;

    Ok(User {
        id,
        username: username.to_string(),
        created_at: now,
    })
}

/// Includes the password hash, for login.
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, username, password, created_at FROM users WHERE username = ?1",
            [username],
            map_user,
        )
        .optional()?;
    Ok(row)
}

pub fn get_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, username, password, created_at FROM users WHERE id = ?1",
        [id.to_string()],
        map_user,
    )
    .optional()?
    .map(User::try_from)
    .transpose()
}

impl Database {
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        self.with_tx(|tx| create_user(tx, username, password_hash, Utc::now()))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| get_user_by_username(conn, username))
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| get_user(conn, id))
    }
}
