use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use studyhall_types::Rejection;
use studyhall_types::api::{LocationFilter, TimeFilter};
use studyhall_types::membership::Capacity;
use studyhall_types::models::{Actor, Participant, StudyGroup};
use tracing::debug;
use uuid::Uuid;

use crate::models::{GroupRow, ParticipantRow, ts};
use crate::{Database, Result};

const GROUP_SELECT: &str = "
    SELECT g.id, g.course_id, g.host_id, u.username, g.title, g.description,
           g.scheduled_at, g.location, g.max_participants,
           (SELECT COUNT(*) FROM participants p WHERE p.group_id = g.id),
           g.created_at
    FROM study_groups g
    JOIN users u ON u.id = g.host_id";

fn map_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        course_id: row.get(1)?,
        host_id: row.get(2)?,
        host_username: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        scheduled_at: row.get(6)?,
        location: row.get(7)?,
        max_participants: row.get(8)?,
        participant_count: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Validated input for a new study group.
pub struct NewGroup<'a> {
    pub course_id: Uuid,
    pub host_id: Uuid,
    pub title: &'a str,
    pub description: &'a str,
    pub scheduled_at: DateTime<Utc>,
    pub location: &'a str,
    pub capacity: Capacity,
}

/// Creates the group with its host as the first participant.
pub fn create_group(conn: &Connection, new: &NewGroup<'_>, now: DateTime<Utc>) -> Result<StudyGroup> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO study_groups
            (id, course_id, host_id, title, description, scheduled_at, location, max_participants, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            id.to_string(),
            new.course_id.to_string(),
            new.host_id.to_string(),
            new.title.trim(),
            new.description.trim(),
            ts(new.scheduled_at),
            new.location.trim(),
            new.capacity.as_raw(),
            ts(now),
        ],
    )?;
    insert_participant(conn, id, new.host_id, now)?;

    require_group(conn, id)
}

fn insert_participant(conn: &Connection, group_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO participants (id, group_id, user_id, joined_at) VALUES (?1, ?2, ?3, ?4)",
        (
            Uuid::new_v4().to_string(),
            group_id.to_string(),
            user_id.to_string(),
            ts(now),
        ),
    )?;
    Ok(())
}

pub fn get_group(conn: &Connection, id: Uuid) -> Result<Option<StudyGroup>> {
    conn.query_row(&format!("{GROUP_SELECT} WHERE g.id = ?1"), [id.to_string()], map_group)
        .optional()?
        .map(StudyGroup::try_from)
        .transpose()
}

pub fn require_group(conn: &Connection, id: Uuid) -> Result<StudyGroup> {
    get_group(conn, id)?.ok_or_else(|| Rejection::not_found("study group").into())
}

/// Upcoming and all groups are listed soonest first; past groups most recent first.
pub fn list_groups(
    conn: &Connection,
    course_id: Uuid,
    time: TimeFilter,
    location: LocationFilter,
    now: DateTime<Utc>,
) -> Result<Vec<StudyGroup>> {
    let mut params = vec![course_id.to_string()];
    let (filter, order) = match time {
        TimeFilter::Upcoming => {
            params.push(ts(now));
            ("AND g.scheduled_at >= ?2", "ASC")
        }
        TimeFilter::Past => {
            params.push(ts(now));
            ("AND g.scheduled_at < ?2", "DESC")
        }
        TimeFilter::All => ("", "ASC"),
    };

    let mut stmt = conn.prepare(&format!(
        "{GROUP_SELECT} WHERE g.course_id = ?1 {filter} ORDER BY g.scheduled_at {order}"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), map_group)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let groups = rows
        .into_iter()
        .map(StudyGroup::try_from)
        .collect::<Result<Vec<_>>>()?;

    Ok(groups
        .into_iter()
        .filter(|g| match location {
            LocationFilter::All => true,
            LocationFilter::Virtual => g.is_virtual(),
            LocationFilter::InPerson => !g.is_virtual(),
        })
        .collect())
}

pub fn list_participants(conn: &Connection, group_id: Uuid) -> Result<Vec<Participant>> {
    let mut stmt = conn.prepare(
        "SELECT p.user_id, u.username, p.joined_at
         FROM participants p
         JOIN users u ON u.id = p.user_id
         WHERE p.group_id = ?1
         ORDER BY p.joined_at ASC",
    )?;
    let rows = stmt
        .query_map([group_id.to_string()], |row| {
            Ok(ParticipantRow {
                user_id: row.get(0)?,
                username: row.get(1)?,
                joined_at: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(Participant::try_from).collect()
}

pub fn is_participant(conn: &Connection, group_id: Uuid, user_id: Uuid) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM participants WHERE group_id = ?1 AND user_id = ?2",
            (group_id.to_string(), user_id.to_string()),
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn join_group(conn: &Connection, group_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<StudyGroup> {
    let group = require_group(conn, group_id)?;
    group.check_join(is_participant(conn, group_id, user_id)?, now)?;

    insert_participant(conn, group_id, user_id, now)?;
    debug!(%group_id, %user_id, "joined study group");

    require_group(conn, group_id)
}

pub fn leave_group(conn: &Connection, group_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<StudyGroup> {
    let group = require_group(conn, group_id)?;
    group.check_leave(user_id, is_participant(conn, group_id, user_id)?, now)?;

    conn.execute(
        "DELETE FROM participants WHERE group_id = ?1 AND user_id = ?2",
        (group_id.to_string(), user_id.to_string()),
    )?;
    debug!(%group_id, %user_id, "left study group");

    require_group(conn, group_id)
}

/// Only the host (or a moderator) may delete a group.
pub fn delete_group(conn: &Connection, group_id: Uuid, actor: &Actor) -> Result<()> {
    let group = require_group(conn, group_id)?;
    if !actor.may_manage(group.host_id) {
        return Err(Rejection::permission_denied("only the host can delete this study group").into());
    }
    conn.execute("DELETE FROM study_groups WHERE id = ?1", [group_id.to_string()])?;
    Ok(())
}

impl Database {
    pub fn create_group(&self, new: &NewGroup<'_>, now: DateTime<Utc>) -> Result<StudyGroup> {
        self.with_tx(|tx| create_group(tx, new, now))
    }

    pub fn get_group(&self, id: Uuid) -> Result<Option<StudyGroup>> {
        self.with_conn(|conn| get_group(conn, id))
    }

    pub fn group_with_participants(&self, id: Uuid) -> Result<(StudyGroup, Vec<Participant>)> {
        self.with_conn(|conn| Ok((require_group(conn, id)?, list_participants(conn, id)?)))
    }

    pub fn list_groups(
        &self,
        course_id: Uuid,
        time: TimeFilter,
        location: LocationFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<StudyGroup>> {
        self.with_conn(|conn| list_groups(conn, course_id, time, location, now))
    }

    pub fn join_group(&self, group_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<StudyGroup> {
        self.with_tx(|tx| join_group(tx, group_id, user_id, now))
    }

    pub fn leave_group(&self, group_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<StudyGroup> {
        self.with_tx(|tx| leave_group(tx, group_id, user_id, now))
    }

    pub fn delete_group(&self, group_id: Uuid, actor: &Actor) -> Result<()> {
        self.with_tx(|tx| delete_group(tx, group_id, actor))
    }
}
