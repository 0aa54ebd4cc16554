use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use studyhall_types::api::{
    CreatePostRequest, CreateReplyRequest, ListPostsQuery, PinRequest, PostDetail,
    UpdatePostRequest,
};
use studyhall_types::ranking::SortMode;

use crate::courses::require_course;
use crate::error::ApiError;
use crate::extract::{CurrentUser, Json, Path, Query};
use crate::{AppState, run_db};

/// GET /courses/{code}/posts?sort=hot|new|top|trending&category=
pub async fn list_posts(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<ListPostsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = SortMode::parse_lenient(query.sort.as_deref());
    let now = Utc::now();
    let posts = run_db(&state, move |db| {
        let course = require_course(db, &code)?;
        db.list_posts(course.id, sort, query.category, now)
    })
    .await?;

    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(code): Path<String>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let author_id = user.id;
    let post = run_db(&state, move |db| {
        let course = require_course(db, &code)?;
        db.create_post(course.id, author_id, &req.title, &req.content, req.category, Utc::now())
    })
    .await?;
    info!(post_id = %post.id, author = %user.username, "created post");

    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /posts/{post_id}: the post with its replies, best first.
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (post, replies) = run_db(&state, move |db| db.post_with_replies(post_id)).await?;
    Ok(Json(PostDetail { post, replies }))
}

pub async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let editor_id = user.id;
    let post = run_db(&state, move |db| db.update_post(post_id, editor_id, &req, Utc::now())).await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = user.actor();
    run_db(&state, move |db| db.delete_post(post_id, &actor)).await?;
    info!(%post_id, by = %user.username, "deleted post");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn pin_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(req): Json<PinRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = user.actor();
    let post = run_db(&state, move |db| db.set_pinned(post_id, &actor, req.pinned)).await?;
    info!(%post_id, pinned = post.pinned, by = %user.username, "changed pin");

    Ok(Json(post))
}

pub async fn create_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CreateReplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let author_id = user.id;
    let reply = run_db(&state, move |db| {
        db.create_reply(post_id, author_id, &req.content, Utc::now())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(reply_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = user.actor();
    run_db(&state, move |db| db.delete_reply(reply_id, &actor)).await?;

    Ok(StatusCode::NO_CONTENT)
}
