use axum::extract::{Path, State};
use axum::Json;
use quill_core::domain::events::Event;
use quill_core::domain::replies::ReplyView;
use quill_infra::db::comments_repo::{activate_comment, delete_comment, get_comment};
use tracing::info;

use crate::http::error::ApiError;
use crate::state::AppState;

/// Publishes a comment held for moderation.
pub async fn activate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ReplyView>, ApiError> {
    activate_comment(&state.db, id).await?;
    info!(id, "comment activated");
    state.events.publish(Event::CommentActivated { id });
    let comment = get_comment(&state.db, id).await?;
    Ok(Json(state.renderer.view(&comment, false)))
}

/// Body is the soft-deleted placeholder, or `null` when the row is gone.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Option<ReplyView>>, ApiError> {
    let placeholder = delete_comment(&state.db, id).await?;
    info!(id, soft = placeholder.is_some(), "comment deleted by moderator");
    state.events.publish(Event::CommentDeleted { id });
    Ok(Json(
        placeholder.map(|comment| state.renderer.view(&comment, false)),
    ))
}
