//! Ordering policies for a course's discussion board.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Post, Reply};

/// Hours added to a post's age so brand-new posts don't divide by ~zero.
const HOT_AGE_OFFSET_HOURS: f64 = 2.0;
const HOT_GRAVITY: f64 = 1.5;
const TRENDING_WINDOW_HOURS: i64 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Hot,
    New,
    Top,
    Trending,
}

impl SortMode {
    /// Unknown or missing modes fall back to `hot`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for SortMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hot" => Ok(Self::Hot),
            "new" => Ok(Self::New),
            "top" => Ok(Self::Top),
            "trending" => Ok(Self::Trending),
            _ => Err(()),
        }
    }
}

/// `score / (age_hours + 2) ^ 1.5`, with age measured in fractional hours at `now`.
pub fn hot_score(score: i64, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = ((now - created_at).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
    score as f64 / (age_hours + HOT_AGE_OFFSET_HOURS).powf(HOT_GRAVITY)
}

/// Orders (and for `trending`, filters) a course's posts. Pinned posts always come first.
pub fn rank_posts(posts: Vec<Post>, mode: SortMode, now: DateTime<Utc>) -> Vec<Post> {
    let newest_first = |a: &Post, b: &Post| b.created_at.cmp(&a.created_at);
    let pinned_first = |a: &Post, b: &Post| b.pinned.cmp(&a.pinned);

    match mode {
        SortMode::New => {
            let mut posts = posts;
            posts.sort_by(|a, b| pinned_first(a, b).then_with(|| newest_first(a, b)));
            posts
        }
        SortMode::Top => {
            let mut posts = posts;
            posts.sort_by(|a, b| {
                pinned_first(a, b)
                    .then_with(|| b.score.cmp(&a.score))
                    .then_with(|| newest_first(a, b))
            });
            posts
        }
        SortMode::Trending => {
            let cutoff = now - Duration::hours(TRENDING_WINDOW_HOURS);
            let mut posts: Vec<Post> = posts.into_iter().filter(|p| p.created_at >= cutoff).collect();
            posts.sort_by(|a, b| {
                pinned_first(a, b)
                    .then_with(|| b.score.cmp(&a.score))
                    .then_with(|| newest_first(a, b))
            });
            posts
        }
        SortMode::Hot => {
            let mut scored: Vec<(f64, Post)> = posts
                .into_iter()
                .map(|p| (hot_score(p.score, p.created_at, now), p))
                .collect();
            scored.sort_by(|(ha, a), (hb, b)| {
                pinned_first(a, b)
                    .then_with(|| hb.total_cmp(ha))
                    .then_with(|| newest_first(a, b))
            });
            scored.into_iter().map(|(_, p)| p).collect()
        }
    }
}

/// Highest score first; among ties the earliest reply wins.
pub fn sort_replies(replies: &mut [Reply]) {
    replies.sort_by(|a, b| match b.score.cmp(&a.score) {
        Ordering::Equal => a.created_at.cmp(&b.created_at),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use uuid::Uuid;

    fn post(title: &str, score: i64, hours_old: i64, pinned: bool, now: DateTime<Utc>) -> Post {
        let created_at = now - Duration::hours(hours_old);
        Post {
            id: Uuid::new_v4(),
            course_id: Uuid::nil(),
            author_id: Uuid::new_v4(),
            author_username: "alice".into(),
            title: title.into(),
            content: "body".into(),
            category: Category::General,
            pinned,
            score,
            reply_count: 0,
            created_at,
            updated_at: created_at,
        }
    }

    fn titles(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn hot_score_matches_formula() {
        let now = Utc::now();
        let a = hot_score(8, now - Duration::hours(100), now);
        let b = hot_score(4, now - Duration::hours(1), now);
        assert!((a - 0.00777).abs() < 1e-4, "got {a}");
        assert!((b - 0.7698).abs() < 1e-3, "got {b}");
    }

    #[test]
    fn hot_score_uses_fractional_hours() {
        let now = Utc::now();
        let s = hot_score(10, now - Duration::minutes(90), now);
        assert!((s - 10.0 / 3.5_f64.powf(1.5)).abs() < 1e-9);
    }

    #[test]
    fn future_timestamps_clamp_to_zero_age() {
        let now = Utc::now();
        let s = hot_score(4, now + Duration::hours(5), now);
        assert!((s - 4.0 / 2.0_f64.powf(1.5)).abs() < 1e-9);
    }

    #[test]
    fn recent_post_beats_old_high_score_under_hot() {
        let now = Utc::now();
        let ranked = rank_posts(
            vec![post("A", 8, 100, false, now), post("B", 4, 1, false, now)],
            SortMode::Hot,
            now,
        );
        assert_eq!(titles(&ranked), ["B", "A"]);
    }

    #[test]
    fn higher_score_wins_at_equal_age() {
        let now = Utc::now();
        for mode in [SortMode::Top, SortMode::Hot] {
            let ranked = rank_posts(
                vec![post("five", 5, 1, false, now), post("ten", 10, 1, false, now)],
                mode,
                now,
            );
            assert_eq!(titles(&ranked), ["ten", "five"], "mode {mode:?}");
        }
    }

    #[test]
    fn pinned_first_regardless_of_score() {
        let now = Utc::now();
        let posts = vec![
            post("popular", 500, 1, false, now),
            post("rules", -3, 300, true, now),
            post("fresh", 2, 0, false, now),
        ];
        for mode in [SortMode::Hot, SortMode::New, SortMode::Top] {
            let ranked = rank_posts(posts.clone(), mode, now);
            assert_eq!(ranked[0].title, "rules", "mode {mode:?}");
        }
    }

    #[test]
    fn new_orders_by_creation() {
        let now = Utc::now();
        let ranked = rank_posts(
            vec![post("old", 50, 30, false, now), post("newer", 0, 2, false, now)],
            SortMode::New,
            now,
        );
        assert_eq!(titles(&ranked), ["newer", "old"]);
    }

    #[test]
    fn top_breaks_ties_by_recency() {
        let now = Utc::now();
        let ranked = rank_posts(
            vec![post("older", 3, 10, false, now), post("younger", 3, 5, false, now)],
            SortMode::Top,
            now,
        );
        assert_eq!(titles(&ranked), ["younger", "older"]);
    }

    #[test]
    fn trending_drops_posts_older_than_two_days() {
        let now = Utc::now();
        let ranked = rank_posts(
            vec![
                post("ancient", 100, 49, false, now),
                post("recent", 1, 47, false, now),
                post("today", 7, 3, false, now),
            ],
            SortMode::Trending,
            now,
        );
        assert_eq!(titles(&ranked), ["today", "recent"]);
    }

    #[test]
    fn replies_by_score_then_oldest() {
        let now = Utc::now();
        let reply = |content: &str, score: i64, hours_old: i64| Reply {
            id: Uuid::new_v4(),
            post_id: Uuid::nil(),
            author_id: Uuid::new_v4(),
            author_username: "bob".into(),
            content: content.into(),
            score,
            created_at: now - Duration::hours(hours_old),
        };
        let mut replies = vec![reply("late", 2, 1), reply("low", 0, 9), reply("early", 2, 5)];
        sort_replies(&mut replies);
        let order: Vec<_> = replies.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, ["early", "late", "low"]);
    }

    #[test]
    fn sort_mode_parsing_is_lenient() {
        assert_eq!(SortMode::parse_lenient(Some("TOP")), SortMode::Top);
        assert_eq!(SortMode::parse_lenient(Some("bogus")), SortMode::Hot);
        assert_eq!(SortMode::parse_lenient(None), SortMode::Hot);
    }
}
