pub mod auth;
pub mod chat;
pub mod courses;
pub mod error;
pub mod extract;
pub mod groups;
pub mod posts;
pub mod votes;

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use studyhall_db::Database;

use crate::error::ApiError;

/// Upper bound on how long an issued token stays valid.
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    /// Usernames allowed to pin posts, moderate content and manage courses.
    pub moderators: HashSet<String>,
}

impl AppStateInner {
    pub fn is_moderator(&self, username: &str) -> bool {
        self.moderators.contains(username)
    }
}

/// Runs a blocking database call off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> studyhall_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Join(e)
        })?
        .map_err(ApiError::from)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/courses", get(courses::list_courses).post(courses::create_course))
        .route(
            "/courses/{code}",
            get(courses::course_detail).delete(courses::delete_course),
        )
        .route("/courses/{code}/groups", post(groups::create_group))
        .route("/courses/{code}/posts", get(posts::list_posts).post(posts::create_post))
        .route("/groups/{group_id}", get(groups::get_group).delete(groups::delete_group))
        .route("/groups/{group_id}/join", post(groups::join_group))
        .route("/groups/{group_id}/leave", post(groups::leave_group))
        .route(
            "/groups/{group_id}/messages",
            get(chat::get_messages).post(chat::send_message),
        )
        .route(
            "/posts/{post_id}",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/{post_id}/pin", post(posts::pin_post))
        .route("/posts/{post_id}/replies", post(posts::create_reply))
        .route("/posts/{post_id}/vote", post(votes::vote_post))
        .route("/replies/{reply_id}", delete(posts::delete_reply))
        .route("/replies/{reply_id}/vote", post(votes::vote_reply))
        .fallback(error::fallback)
        .method_not_allowed_fallback(error::method_not_allowed)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
