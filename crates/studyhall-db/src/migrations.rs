use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, courses, study groups)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE courses (
                id          TEXT PRIMARY KEY,
                code        TEXT NOT NULL UNIQUE,
                title       TEXT NOT NULL,
                description TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE study_groups (
                id               TEXT PRIMARY KEY,
                course_id        TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
                host_id          TEXT NOT NULL REFERENCES users(id),
                title            TEXT NOT NULL,
                description      TEXT NOT NULL,
                scheduled_at     TEXT NOT NULL,
                location         TEXT NOT NULL,
                max_participants INTEGER NOT NULL
                    CHECK (max_participants = -1 OR max_participants > 0),
                created_at       TEXT NOT NULL
            );

            CREATE INDEX idx_study_groups_course
                ON study_groups(course_id, scheduled_at);

            CREATE TABLE participants (
                id          TEXT PRIMARY KEY,
                group_id    TEXT NOT NULL REFERENCES study_groups(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                joined_at   TEXT NOT NULL,
                UNIQUE(group_id, user_id)
            );

            CREATE TABLE chat_messages (
                id          TEXT PRIMARY KEY,
                group_id    TEXT NOT NULL REFERENCES study_groups(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_chat_messages_group
                ON chat_messages(group_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (discussion board)");
        conn.execute_batch(
            "
            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                course_id   TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL REFERENCES users(id),
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                category    TEXT NOT NULL DEFAULT 'general'
                    CHECK (category IN ('general', 'question', 'resources', 'exam-prep', 'announcement')),
                pinned      INTEGER NOT NULL DEFAULT 0,
                score       INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_course ON posts(course_id);

            CREATE TABLE replies (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                score       INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_replies_post ON replies(post_id);

            CREATE TABLE post_votes (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                voter_id    TEXT NOT NULL REFERENCES users(id),
                value       INTEGER NOT NULL CHECK (value IN (-1, 1)),
                created_at  TEXT NOT NULL,
                UNIQUE(post_id, voter_id)
            );

            CREATE TABLE reply_votes (
                id          TEXT PRIMARY KEY,
                reply_id    TEXT NOT NULL REFERENCES replies(id) ON DELETE CASCADE,
                voter_id    TEXT NOT NULL REFERENCES users(id),
                value       INTEGER NOT NULL CHECK (value IN (-1, 1)),
                created_at  TEXT NOT NULL,
                UNIQUE(reply_id, voter_id)
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
