use axum::{
    extract::State,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use studyhall_types::api::VoteRequest;
use studyhall_types::models::VoteTarget;

use crate::error::ApiError;
use crate::extract::{CurrentUser, Json, Path};
use crate::{AppState, run_db};

async fn cast(
    state: AppState,
    user: CurrentUser,
    target: VoteTarget,
    req: VoteRequest,
) -> Result<impl IntoResponse, ApiError> {
    let voter_id = user.id;
    let outcome = run_db(&state, move |db| db.cast_vote(target, voter_id, req.value, Utc::now())).await?;
    Ok(Json(outcome))
}

/// POST /posts/{post_id}/vote with `{ "value": -1 | 0 | 1 }`.
pub async fn vote_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(req): Json<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    cast(state, user, VoteTarget::Post(post_id), req).await
}

pub async fn vote_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(reply_id): Path<Uuid>,
    Json(req): Json<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    cast(state, user, VoteTarget::Reply(reply_id), req).await
}
