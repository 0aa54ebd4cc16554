use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use studyhall_types::Rejection;
use studyhall_types::api::UpdatePostRequest;
use studyhall_types::models::{Actor, Category, Post, Reply};
use studyhall_types::ranking::{self, SortMode};
use uuid::Uuid;

use crate::models::{PostRow, ReplyRow, ts};
use crate::{Database, Result};

const POST_SELECT: &str = "
    SELECT p.id, p.course_id, p.author_id, u.username, p.title, p.content,
           p.category, p.pinned, p.score,
           (SELECT COUNT(*) FROM replies r WHERE r.post_id = p.id),
           p.created_at, p.updated_at
    FROM posts p
    JOIN users u ON u.id = p.author_id";

const REPLY_SELECT: &str = "
    SELECT r.id, r.post_id, r.author_id, u.username, r.content, r.score, r.created_at
    FROM replies r
    JOIN users u ON u.id = r.author_id";

fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        course_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        title: row.get(4)?,
        content: row.get(5)?,
        category: row.get(6)?,
        pinned: row.get(7)?,
        score: row.get(8)?,
        reply_count: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn map_reply(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReplyRow> {
    Ok(ReplyRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        content: row.get(4)?,
        score: row.get(5)?,
        created_at: row.get(6)?,
    })
}

// -- Posts --

pub fn create_post(
    conn: &Connection,
    course_id: Uuid,
    author_id: Uuid,
    title: &str,
    content: &str,
    category: Category,
    now: DateTime<Utc>,
) -> Result<Post> {
    let course_exists = conn
        .query_row("SELECT 1 FROM courses WHERE id = ?1", [course_id.to_string()], |_| Ok(()))
        .optional()?
        .is_some();
    if !course_exists {
        return Err(Rejection::not_found("course").into());
    }

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO posts (id, course_id, author_id, title, content, category, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        rusqlite::params![
            id.to_string(),
            course_id.to_string(),
            author_id.to_string(),
            title.trim(),
            content.trim(),
            category.as_str(),
            ts(now),
        ],
    )?;

    require_post(conn, id)
}

pub fn get_post(conn: &Connection, id: Uuid) -> Result<Option<Post>> {
    conn.query_row(&format!("{POST_SELECT} WHERE p.id = ?1"), [id.to_string()], map_post)
        .optional()?
        .map(Post::try_from)
        .transpose()
}

pub fn require_post(conn: &Connection, id: Uuid) -> Result<Post> {
    get_post(conn, id)?.ok_or_else(|| Rejection::not_found("post").into())
}

/// A course's board in the requested order. Hot scores depend on `now`, so
/// ranking always happens at read time.
pub fn list_posts(
    conn: &Connection,
    course_id: Uuid,
    sort: SortMode,
    category: Option<Category>,
    now: DateTime<Utc>,
) -> Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT} WHERE p.course_id = ?1 AND (?2 IS NULL OR p.category = ?2)"
    ))?;
    let rows = stmt
        .query_map(
            rusqlite::params![course_id.to_string(), category.map(Category::as_str)],
            map_post,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let posts = rows
        .into_iter()
        .map(Post::try_from)
        .collect::<Result<Vec<_>>>()?;

    Ok(ranking::rank_posts(posts, sort, now))
}

/// Only the author may edit a post.
pub fn update_post(
    conn: &Connection,
    post_id: Uuid,
    editor_id: Uuid,
    changes: &UpdatePostRequest,
    now: DateTime<Utc>,
) -> Result<Post> {
    let post = require_post(conn, post_id)?;
    if post.author_id != editor_id {
        return Err(Rejection::permission_denied("only the author can edit this post").into());
    }

    let title = changes.title.as_deref().map_or(post.title.as_str(), str::trim);
    let content = changes.content.as_deref().map_or(post.content.as_str(), str::trim);
    let category = changes.category.unwrap_or(post.category);
    conn.execute(
        "UPDATE posts SET title = ?2, content = ?3, category = ?4, updated_at = ?5 WHERE id = ?1",
        (post_id.to_string(), title, content, category.as_str(), ts(now)),
    )?;

    require_post(conn, post_id)
}

pub fn set_pinned(conn: &Connection, post_id: Uuid, actor: &Actor, pinned: bool) -> Result<Post> {
    if !actor.is_moderator {
        return Err(Rejection::permission_denied("only moderators can pin posts").into());
    }
    let updated = conn.execute(
        "UPDATE posts SET pinned = ?2 WHERE id = ?1",
        (post_id.to_string(), pinned),
    )?;
    if updated == 0 {
        return Err(Rejection::not_found("post").into());
    }
    require_post(conn, post_id)
}

pub fn delete_post(conn: &Connection, post_id: Uuid, actor: &Actor) -> Result<()> {
    let post = require_post(conn, post_id)?;
    if !actor.may_manage(post.author_id) {
        return Err(Rejection::permission_denied("only the author can delete this post").into());
    }
    conn.execute("DELETE FROM posts WHERE id = ?1", [post_id.to_string()])?;
    Ok(())
}

// -- Replies --

pub fn create_reply(
    conn: &Connection,
    post_id: Uuid,
    author_id: Uuid,
    content: &str,
    now: DateTime<Utc>,
) -> Result<Reply> {
    require_post(conn, post_id)?;

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO replies (id, post_id, author_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        (id.to_string(), post_id.to_string(), author_id.to_string(), content.trim(), ts(now)),
    )?;

    require_reply(conn, id)
}

pub fn get_reply(conn: &Connection, id: Uuid) -> Result<Option<Reply>> {
    conn.query_row(&format!("{REPLY_SELECT} WHERE r.id = ?1"), [id.to_string()], map_reply)
        .optional()?
        .map(Reply::try_from)
        .transpose()
}

pub fn require_reply(conn: &Connection, id: Uuid) -> Result<Reply> {
    get_reply(conn, id)?.ok_or_else(|| Rejection::not_found("reply").into())
}

/// Highest score first, earliest first among ties.
pub fn list_replies(conn: &Connection, post_id: Uuid) -> Result<Vec<Reply>> {
    require_post(conn, post_id)?;

    let mut stmt = conn.prepare(&format!("{REPLY_SELECT} WHERE r.post_id = ?1"))?;
    let rows = stmt
        .query_map([post_id.to_string()], map_reply)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut replies = rows
        .into_iter()
        .map(Reply::try_from)
        .collect::<Result<Vec<_>>>()?;
    ranking::sort_replies(&mut replies);
    Ok(replies)
}

pub fn delete_reply(conn: &Connection, reply_id: Uuid, actor: &Actor) -> Result<()> {
    let reply = require_reply(conn, reply_id)?;
    if !actor.may_manage(reply.author_id) {
        return Err(Rejection::permission_denied("only the author can delete this reply").into());
    }
    conn.execute("DELETE FROM replies WHERE id = ?1", [reply_id.to_string()])?;
    Ok(())
}

impl Database {
    pub fn create_post(
        &self,
        course_id: Uuid,
        author_id: Uuid,
        title: &str,
        content: &str,
        category: Category,
        now: DateTime<Utc>,
    ) -> Result<Post> {
        self.with_tx(|tx| create_post(tx, course_id, author_id, title, content, category, now))
    }

    pub fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.with_conn(|conn| get_post(conn, id))
    }

    pub fn list_posts(
        &self,
        course_id: Uuid,
        sort: SortMode,
        category: Option<Category>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        self.with_conn(|conn| list_posts(conn, course_id, sort, category, now))
    }

    pub fn post_with_replies(&self, id: Uuid) -> Result<(Post, Vec<Reply>)> {
        self.with_conn(|conn| Ok((require_post(conn, id)?, list_replies(conn, id)?)))
    }

    pub fn update_post(
        &self,
        post_id: Uuid,
        editor_id: Uuid,
        changes: &UpdatePostRequest,
        now: DateTime<Utc>,
    ) -> Result<Post> {
        self.with_tx(|tx| update_post(tx, post_id, editor_id, changes, now))
    }

    pub fn set_pinned(&self, post_id: Uuid, actor: &Actor, pinned: bool) -> Result<Post> {
        self.with_tx(|tx| set_pinned(tx, post_id, actor, pinned))
    }

    pub fn delete_post(&self, post_id: Uuid, actor: &Actor) -> Result<()> {
        self.with_tx(|tx| delete_post(tx, post_id, actor))
    }

    pub fn create_reply(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply> {
        self.with_tx(|tx| create_reply(tx, post_id, author_id, content, now))
    }

    pub fn list_replies(&self, post_id: Uuid) -> Result<Vec<Reply>> {
        self.with_conn(|conn| list_replies(conn, post_id))
    }

    pub fn delete_reply(&self, reply_id: Uuid, actor: &Actor) -> Result<()> {
        self.with_tx(|tx| delete_reply(tx, reply_id, actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;
    use crate::queries::fixtures;
    use chrono::{Duration, SubsecRound};
    use studyhall_types::ReasonCode;

    fn reason(result: Result<impl std::fmt::Debug>) -> ReasonCode {
        match result {
            Err(DbError::Rejected(r)) => r.reason(),
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    fn student(id: Uuid) -> Actor {
        Actor { user_id: id, is_moderator: false }
    }

    fn moderator(id: Uuid) -> Actor {
        Actor { user_id: id, is_moderator: true }
    }

    #[test]
    fn new_posts_start_at_zero() {
        let db = fixtures::db();
        let course = fixtures::course(&db, "COS 226");
        let alice = fixtures::user(&db, "alice");
        let post = fixtures::post_at(&db, &course, &alice, "Union-find question", Utc::now());

        assert_eq!(post.score, 0);
        assert!(!post.pinned);
        assert_eq!(post.category, Category::Question);
        assert_eq!(post.author_username, "alice");
    }

    #[test]
    fn posting_to_missing_course_is_not_found() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let result = db.create_post(Uuid::new_v4(), alice.id, "Hello", "there", Category::General, Utc::now());
        assert_eq!(reason(result), ReasonCode::NotFound);
    }

    #[test]
    fn listing_filters_by_category_and_sorts() {
        let db = fixtures::db();
        let course = fixtures::course(&db, "COS 226");
        let alice = fixtures::user(&db, "alice");
        let now = Utc::now();

        fixtures::post_at(&db, &course, &alice, "older", now - Duration::hours(5));
        fixtures::post_at(&db, &course, &alice, "newer", now - Duration::hours(1));
        db.create_post(course.id, alice.id, "Slides", "link", Category::Resources, now)
            .unwrap();

        let new: Vec<_> = db
            .list_posts(course.id, SortMode::New, Some(Category::Question), now)
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(new, ["newer", "older"]);

        let all = db.list_posts(course.id, SortMode::New, None, now).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "Slides");
    }

    #[test]
    fn pinning_is_for_moderators() {
        let db = fixtures::db();
        let course = fixtures::course(&db, "COS 226");
        let alice = fixtures::user(&db, "alice");
        let mod_user = fixtures::user(&db, "preceptor");
        let now = Utc::now();
        let rules = fixtures::post_at(&db, &course, &alice, "Board rules", now - Duration::days(30));
        fixtures::post_at(&db, &course, &alice, "Fresh", now);

        assert_eq!(
            reason(db.set_pinned(rules.id, &student(alice.id), true)),
            ReasonCode::PermissionDenied
        );
        let pinned = db.set_pinned(rules.id, &moderator(mod_user.id), true).unwrap();
        assert!(pinned.pinned);

        let hot = db.list_posts(course.id, SortMode::Hot, None, now).unwrap();
        assert_eq!(hot[0].title, "Board rules");

        assert_eq!(
            reason(db.set_pinned(Uuid::new_v4(), &moderator(mod_user.id), true)),
            ReasonCode::NotFound
        );
    }

    #[test]
    fn only_author_edits() {
        let db = fixtures::db();
        let course = fixtures::course(&db, "COS 226");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let post = fixtures::post_at(&db, &course, &alice, "Typo in titel", Utc::now());

        let changes = UpdatePostRequest {
            title: Some("Typo in title".into()),
            content: None,
            category: Some(Category::General),
        };
        assert_eq!(
            reason(db.update_post(post.id, bob.id, &changes, Utc::now())),
            ReasonCode::PermissionDenied
        );

        let later = (Utc::now() + Duration::minutes(5)).trunc_subsecs(0);
        let edited = db.update_post(post.id, alice.id, &changes, later).unwrap();
        assert_eq!(edited.title, "Typo in title");
        assert_eq!(edited.content, post.content);
        assert_eq!(edited.category, Category::General);
        assert_eq!(edited.updated_at, later);
    }

    #[test]
    fn replies_and_cascading_delete() {
        let db = fixtures::db();
        let course = fixtures::course(&db, "COS 226");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let post = fixtures::post_at(&db, &course, &alice, "Question", Utc::now());

        let reply = db.create_reply(post.id, bob.id, "Try a heap", Utc::now()).unwrap();
        let (post_again, replies) = db.post_with_replies(post.id).unwrap();
        assert_eq!(post_again.reply_count, 1);
        assert_eq!(replies[0].id, reply.id);

        assert_eq!(reason(db.delete_post(post.id, &student(bob.id))), ReasonCode::PermissionDenied);
        db.delete_post(post.id, &student(alice.id)).unwrap();
        assert!(db.get_post(post.id).unwrap().is_none());
        assert!(db.with_conn(|conn| get_reply(conn, reply.id)).unwrap().is_none());
    }

    #[test]
    fn moderators_delete_any_reply() {
        let db = fixtures::db();
        let course = fixtures::course(&db, "COS 226");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let post = fixtures::post_at(&db, &course, &alice, "Question", Utc::now());
        let reply = db.create_reply(post.id, bob.id, "spam", Utc::now()).unwrap();

        assert_eq!(reason(db.delete_reply(reply.id, &student(alice.id))), ReasonCode::PermissionDenied);
        db.delete_reply(reply.id, &moderator(alice.id)).unwrap();
        assert!(db.list_replies(post.id).unwrap().is_empty());
    }
}
