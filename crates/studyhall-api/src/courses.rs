use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use studyhall_db::Database;
use studyhall_types::Rejection;
use studyhall_types::models::Course;
use studyhall_types::api::{
    CourseDetail, CourseDetailQuery, CourseSearchQuery, CreateCourseRequest, GroupResponse,
};

use crate::error::ApiError;
use crate::extract::{CurrentUser, Json, Path, Query};
use crate::{AppState, run_db};

pub(crate) fn require_course(db: &Database, code: &str) -> studyhall_db::Result<Course> {
    Ok(db
        .get_course_by_code(code)?
        .ok_or_else(|| Rejection::not_found("course"))?)
}

fn require_moderator(user: &CurrentUser) -> Result<(), ApiError> {
    if user.is_moderator {
        Ok(())
    } else {
        Err(Rejection::permission_denied("only moderators can manage courses").into())
    }
}

/// GET /courses?search=: every course, or those whose code or title match.
pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let courses = run_db(&state, move |db| db.search_courses(query.search.as_deref(), now)).await?;
    Ok(Json(courses))
}

pub async fn create_course(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_moderator(&user)?;
    req.validate()?;

    let now = Utc::now();
    let course = run_db(&state, move |db| {
        db.create_course(&req.code, &req.title, req.description.as_deref(), now)
    })
    .await?;
    info!(code = %course.code, by = %user.username, "created course");

    Ok((StatusCode::CREATED, Json(course)))
}

/// GET /courses/{code}?time=&location=: the course and its filtered study groups.
pub async fn course_detail(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<CourseDetailQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let (course, groups) = run_db(&state, move |db| {
        let course = require_course(db, &code)?;
        let groups = db.list_groups(course.id, query.time, query.location, now)?;
        Ok((course, groups))
    })
    .await?;

    Ok(Json(CourseDetail {
        course,
        groups: groups.into_iter().map(|g| GroupResponse::new(g, now)).collect(),
    }))
}

pub async fn delete_course(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_moderator(&user)?;
    run_db(&state, move |db| db.delete_course(&code)).await?;
    Ok(StatusCode::NO_CONTENT)
}
