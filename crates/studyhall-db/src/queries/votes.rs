//! Signed unit votes on posts and replies.
//!
//! A target's stored `score` always equals the sum of its vote rows. Every
//! mutation re-derives it with a single aggregate query inside the caller's
//! transaction, so concurrent votes on one target cannot lose updates.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use studyhall_types::Rejection;
use studyhall_types::models::{VoteChange, VoteOutcome, VoteTarget, VoteValue};
use tracing::debug;
use uuid::Uuid;

use crate::models::{parse_uuid, ts};
use crate::{Database, Result};

/// Table layout for one kind of vote target.
struct VoteTable {
    target: &'static str,
    votes: &'static str,
    fk: &'static str,
}

impl VoteTable {
    fn of(target: VoteTarget) -> Self {
        match target {
            VoteTarget::Post(_) => Self {
                target: "posts",
                votes: "post_votes",
                fk: "post_id",
            },
            VoteTarget::Reply(_) => Self {
                target: "replies",
                votes: "reply_votes",
                fk: "reply_id",
            },
        }
    }
}

/// Sets `voter_id`'s vote on `target` to `value`.
///
/// `Clear` removes an existing vote; repeating the current vote is a no-op.
/// Authors can never vote on their own posts or replies.
pub fn cast_vote(
    conn: &Connection,
    target: VoteTarget,
    voter_id: Uuid,
    value: VoteValue,
    now: DateTime<Utc>,
) -> Result<VoteOutcome> {
    let table = VoteTable::of(target);
    let target_id = target.id().to_string();
    let voter = voter_id.to_string();

    let author: String = conn
        .query_row(
            &format!("SELECT author_id FROM {} WHERE id = ?1", table.target),
            [&target_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| Rejection::not_found(target.kind()))?;
    if parse_uuid(&author)? == voter_id {
        return Err(Rejection::permission_denied(format!(
            "you cannot vote on your own {}",
            target.kind()
        ))
        .into());
    }

    let existing: Option<(String, i64)> = conn
        .query_row(
            &format!(
                "SELECT id, value FROM {} WHERE {} = ?1 AND voter_id = ?2",
                table.votes, table.fk
            ),
            [&target_id, &voter],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let change = match (existing, value) {
        (None, VoteValue::Clear) => VoteChange::Unchanged,
        (Some((vote_id, _)), VoteValue::Clear) => {
            conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table.votes), [vote_id])?;
            VoteChange::Removed
        }
        (Some((_, current)), requested) if current == requested.as_i64() => VoteChange::Unchanged,
        (Some((vote_id, _)), requested) => {
            conn.execute(
                &format!("UPDATE {} SET value = ?2 WHERE id = ?1", table.votes),
                (vote_id, requested.as_i64()),
            )?;
            VoteChange::Changed
        }
        (None, requested) => {
            conn.execute(
                &format!(
                    "INSERT INTO {} (id, {}, voter_id, value, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    table.votes, table.fk
                ),
                (
                    Uuid::new_v4().to_string(),
                    &target_id,
                    &voter,
                    requested.as_i64(),
                    ts(now),
                ),
            )?;
            VoteChange::Created
        }
    };

    let score = if change == VoteChange::Unchanged {
        stored_score(conn, &table, &target_id)?
    } else {
        recompute_score(conn, &table, &target_id)?
    };
    debug!(kind = target.kind(), id = %target_id, ?change, score, "vote cast");

    Ok(VoteOutcome {
        change,
        score,
        user_vote: value.as_i64(),
    })
}

fn recompute_score(conn: &Connection, table: &VoteTable, target_id: &str) -> Result<i64> {
    conn.execute(
        &format!(
            "UPDATE {target} SET score =
                (SELECT COALESCE(SUM(value), 0) FROM {votes} WHERE {fk} = ?1)
             WHERE id = ?1",
            target = table.target,
            votes = table.votes,
            fk = table.fk,
        ),
        [target_id],
    )?;
    stored_score(conn, table, target_id)
}

fn stored_score(conn: &Connection, table: &VoteTable, target_id: &str) -> Result<i64> {
    Ok(conn.query_row(
        &format!("SELECT score FROM {} WHERE id = ?1", table.target),
        [target_id],
        |row| row.get(0),
    )?)
}

impl Database {
    pub fn cast_vote(
        &self,
        target: VoteTarget,
        voter_id: Uuid,
        value: VoteValue,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome> {
        self.with_tx(|tx| cast_vote(tx, target, voter_id, value, now))
    }
}
