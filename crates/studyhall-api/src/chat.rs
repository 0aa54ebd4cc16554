use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use studyhall_types::api::{MessageQuery, SendMessageRequest};

use crate::error::ApiError;
use crate::extract::{CurrentUser, Json, Path, Query};
use crate::{AppState, run_db};

/// Chat is scoped to a group's participants; everyone else gets 403.
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let author_id = user.id;
    let message = run_db(&state, move |db| {
        db.send_message(group_id, author_id, &req.content, Utc::now())
    })
    .await?;
    debug!(%group_id, message_id = %message.id, "chat message sent");

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let reader_id = user.id;
    let messages = run_db(&state, move |db| {
        db.list_messages(group_id, reader_id, query.limit, query.before)
    })
    .await?;

    Ok(Json(messages))
}
