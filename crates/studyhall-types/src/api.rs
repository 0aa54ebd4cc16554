use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Rejection;
use crate::membership::Capacity;
use crate::models::{Category, ChatMessage, Course, Participant, Post, Reply, StudyGroup};

/// Group sizes offered when scheduling a meeting (`-1` = unlimited).
pub const ALLOWED_GROUP_SIZES: [i64; 7] = [3, 4, 5, 6, 8, 10, -1];

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), Rejection> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(Rejection::invalid(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

// -- JWT Claims --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), Rejection> {
        check_len("username", &self.username, 3, 32)?;
        if self.username.trim() != self.username {
            return Err(Rejection::invalid("username cannot start or end with whitespace"));
        }
        if self.password.chars().count() < 8 {
            return Err(Rejection::invalid("password must be at least 8 characters"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Courses --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCourseRequest {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateCourseRequest {
    pub fn validate(&self) -> Result<(), Rejection> {
        check_len("course code", &self.code, 2, 20)?;
        check_len("course title", &self.title, 1, 200)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseSearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CourseSummary {
    #[serde(flatten)]
    pub course: Course,
    pub upcoming_groups: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    #[default]
    Upcoming,
    Past,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationFilter {
    #[default]
    All,
    InPerson,
    Virtual,
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseDetailQuery {
    #[serde(default)]
    pub time: TimeFilter,
    #[serde(default)]
    pub location: LocationFilter,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub groups: Vec<GroupResponse>,
}

// -- Study groups --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    pub title: String,
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
    pub location: String,
    pub max_participants: i64,
}

impl CreateGroupRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<Capacity, Rejection> {
        check_len("title", &self.title, 3, 200)?;
        check_len("description", &self.description, 10, 1000)?;
        check_len("location", &self.location, 3, 200)?;
        if !ALLOWED_GROUP_SIZES.contains(&self.max_participants) {
            return Err(Rejection::invalid(format!(
                "max participants must be one of {ALLOWED_GROUP_SIZES:?}"
            )));
        }
        if self.scheduled_at < now {
            return Err(Rejection::invalid("study group date must be in the future"));
        }
        Capacity::try_from(self.max_participants)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupResponse {
    #[serde(flatten)]
    pub group: StudyGroup,
    pub is_full: bool,
    pub is_past: bool,
    pub capacity_label: String,
}

impl GroupResponse {
    pub fn new(group: StudyGroup, now: DateTime<Utc>) -> Self {
        Self {
            is_full: group.is_full(),
            is_past: group.is_past(now),
            capacity_label: group.formatted_capacity(),
            group,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub summary: GroupResponse,
    pub participants: Vec<Participant>,
}

// -- Group chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

impl SendMessageRequest {
    pub fn validate(&self) -> Result<(), Rejection> {
        check_len("message", &self.content, 1, 2000)
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Only return messages created strictly before this timestamp.
    pub before: Option<DateTime<Utc>>,
}

fn default_limit() -> u32 {
    50
}

pub type MessageResponse = ChatMessage;

// -- Discussion board --

#[derive(Debug, Default, Deserialize)]
pub struct ListPostsQuery {
    pub sort: Option<String>,
    pub category: Option<Category>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Category,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), Rejection> {
        check_len("title", &self.title, 3, 200)?;
        check_len("content", &self.content, 1, 10_000)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Category>,
}

impl UpdatePostRequest {
    pub fn validate(&self) -> Result<(), Rejection> {
        if let Some(title) = &self.title {
            check_len("title", title, 3, 200)?;
        }
        if let Some(content) = &self.content {
            check_len("content", content, 1, 10_000)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinRequest {
    pub pinned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReplyRequest {
    pub content: String,
}

impl CreateReplyRequest {
    pub fn validate(&self) -> Result<(), Rejection> {
        check_len("reply", &self.content, 1, 5000)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub replies: Vec<Reply>,
}

// -- Voting --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoteRequest {
    pub value: crate::models::VoteValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn group_request(max: i64, in_hours: i64) -> CreateGroupRequest {
        CreateGroupRequest {
            title: "Final review".into(),
            description: "Working through past exams together".into(),
            scheduled_at: Utc::now() + Duration::hours(in_hours),
            location: "Zoom".into(),
            max_participants: max,
        }
    }

    #[test]
    fn group_request_accepts_offered_sizes() {
        assert_eq!(group_request(-1, 5).validate(Utc::now()).unwrap(), Capacity::Unlimited);
        assert_eq!(group_request(8, 5).validate(Utc::now()).unwrap(), Capacity::Limited(8));
        assert!(group_request(7, 5).validate(Utc::now()).is_err());
    }

    #[test]
    fn group_request_rejects_past_dates() {
        assert!(group_request(4, -2).validate(Utc::now()).is_err());
    }

    #[test]
    fn short_description_rejected() {
        let mut req = group_request(4, 5);
        req.description = "too short".into();
        let err = req.validate(Utc::now()).unwrap_err();
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn register_validation() {
        let ok = RegisterRequest { username: "tiger".into(), password: "orange-and-black".into() };
        assert!(ok.validate().is_ok());
        let short = RegisterRequest { username: "ab".into(), password: "orange-and-black".into() };
        assert!(short.validate().is_err());
        let weak = RegisterRequest { username: "tiger".into(), password: "1234".into() };
        assert!(weak.validate().is_err());
    }

    #[test]
    fn post_category_defaults_to_general() {
        let req: CreatePostRequest =
            serde_json::from_str(r#"{"title":"PS3 hints?","content":"Stuck on 2b"}"#).unwrap();
        assert_eq!(req.category, Category::General);
    }
}
