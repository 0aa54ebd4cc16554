//! Database row types. These map directly to SQLite rows and are converted
//! into `studyhall-types` models at the crate boundary.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use studyhall_types::membership::Capacity;
use studyhall_types::models::{
    Category, ChatMessage, Course, Participant, Post, Reply, StudyGroup, User,
};
use uuid::Uuid;

use crate::{DbError, Result};

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by sqlite's datetime('now') carry no zone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| DbError::Corrupt(format!("timestamp '{raw}': {e}")))
}

pub fn parse_uuid(raw: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|e| DbError::Corrupt(format!("id '{raw}': {e}")))
}

fn count(raw: i64) -> u32 {
    u32::try_from(raw).unwrap_or(u32::MAX)
}

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            username: row.username,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

pub struct CourseRow {
    pub id: String,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl TryFrom<CourseRow> for Course {
    type Error = DbError;

    fn try_from(row: CourseRow) -> Result<Self> {
        Ok(Course {
            id: parse_uuid(&row.id)?,
            code: row.code,
            title: row.title,
            description: row.description,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

pub struct GroupRow {
    pub id: String,
    pub course_id: String,
    pub host_id: String,
    pub host_username: String,
    pub title: String,
    pub description: String,
    pub scheduled_at: String,
    pub location: String,
    pub max_participants: i64,
    pub participant_count: i64,
    pub created_at: String,
}

impl TryFrom<GroupRow> for StudyGroup {
    type Error = DbError;

    fn try_from(row: GroupRow) -> Result<Self> {
        let capacity = Capacity::try_from(row.max_participants)
            .map_err(|e| DbError::Corrupt(format!("group '{}': {e}", row.id)))?;
        Ok(StudyGroup {
            id: parse_uuid(&row.id)?,
            course_id: parse_uuid(&row.course_id)?,
            host_id: parse_uuid(&row.host_id)?,
            host_username: row.host_username,
            title: row.title,
            description: row.description,
            scheduled_at: parse_ts(&row.scheduled_at)?,
            location: row.location,
            capacity,
            participant_count: count(row.participant_count),
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

pub struct ParticipantRow {
    pub user_id: String,
    pub username: String,
    pub joined_at: String,
}

impl TryFrom<ParticipantRow> for Participant {
    type Error = DbError;

    fn try_from(row: ParticipantRow) -> Result<Self> {
        Ok(Participant {
            user_id: parse_uuid(&row.user_id)?,
            username: row.username,
            joined_at: parse_ts(&row.joined_at)?,
        })
    }
}

pub struct MessageRow {
    pub id: String,
    pub group_id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = DbError;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(ChatMessage {
            id: parse_uuid(&row.id)?,
            group_id: parse_uuid(&row.group_id)?,
            author_id: parse_uuid(&row.author_id)?,
            author_username: row.author_username,
            content: row.content,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

pub struct PostRow {
    pub id: String,
    pub course_id: String,
    pub author_id: String,
    pub author_username: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub pinned: bool,
    pub score: i64,
    pub reply_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<PostRow> for Post {
    type Error = DbError;

    fn try_from(row: PostRow) -> Result<Self> {
        let category: Category = row
            .category
            .parse()
            .map_err(|e| DbError::Corrupt(format!("post '{}': {e}", row.id)))?;
        Ok(Post {
            id: parse_uuid(&row.id)?,
            course_id: parse_uuid(&row.course_id)?,
            author_id: parse_uuid(&row.author_id)?,
            author_username: row.author_username,
            title: row.title,
            content: row.content,
            category,
            pinned: row.pinned,
            score: row.score,
            reply_count: count(row.reply_count),
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

pub struct ReplyRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub score: i64,
    pub created_at: String,
}

impl TryFrom<ReplyRow> for Reply {
    type Error = DbError;

    fn try_from(row: ReplyRow) -> Result<Self> {
        Ok(Reply {
            id: parse_uuid(&row.id)?,
            post_id: parse_uuid(&row.post_id)?,
            author_id: parse_uuid(&row.author_id)?,
            author_username: row.author_username,
            content: row.content,
            score: row.score,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_as_text() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(1500);
        assert!(ts(a) < ts(b));
        assert_eq!(parse_ts(&ts(b)).unwrap(), b);
    }

    #[test]
    fn parses_sqlite_default_format() {
        let dt = parse_ts("2025-03-01 09:00:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        assert!(parse_ts("yesterday").is_err());
    }
}
