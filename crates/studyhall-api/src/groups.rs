use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use studyhall_db::queries::groups::NewGroup;
use studyhall_types::api::{CreateGroupRequest, GroupDetail, GroupResponse};

use crate::courses::require_course;
use crate::error::ApiError;
use crate::extract::{CurrentUser, Json, Path};
use crate::{AppState, run_db};

/// POST /courses/{code}/groups: the caller becomes host and first participant.
pub async fn create_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(code): Path<String>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let capacity = req.validate(now)?;

    let host_id = user.id;
    let group = run_db(&state, move |db| {
        let course = require_course(db, &code)?;
        db.create_group(
            &NewGroup {
                course_id: course.id,
                host_id,
                title: &req.title,
                description: &req.description,
                scheduled_at: req.scheduled_at,
                location: &req.location,
                capacity,
            },
            now,
        )
    })
    .await?;
    info!(group_id = %group.id, host = %user.username, "created study group");

    Ok((StatusCode::CREATED, Json(GroupResponse::new(group, now))))
}

pub async fn get_group(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (group, participants) = run_db(&state, move |db| db.group_with_participants(group_id)).await?;

    Ok(Json(GroupDetail {
        summary: GroupResponse::new(group, Utc::now()),
        participants,
    }))
}

pub async fn join_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let user_id = user.id;
    let group = run_db(&state, move |db| db.join_group(group_id, user_id, now)).await?;
    info!(%group_id, username = %user.username, "joined study group");

    Ok(Json(GroupResponse::new(group, now)))
}

pub async fn leave_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let user_id = user.id;
    let group = run_db(&state, move |db| db.leave_group(group_id, user_id, now)).await?;
    info!(%group_id, username = %user.username, "left study group");

    Ok(Json(GroupResponse::new(group, now)))
}

/// DELETE /groups/{group_id}: hosts remove their group instead of leaving it.
pub async fn delete_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = user.actor();
    run_db(&state, move |db| db.delete_group(group_id, &actor)).await?;
    info!(%group_id, by = %user.username, "deleted study group");

    Ok(StatusCode::NO_CONTENT)
}
