use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use quill_core::domain::comments::{Comment, CommentEdit, Mode, NewComment};
use quill_core::domain::events::Event;
use quill_core::domain::replies::{ReplyPage, ReplyView};
use quill_core::types::timestamp::now_secs;
use quill_infra::db::comments_repo::{
    count_comments, delete_comment, get_comment, update_comment, vote_comment,
};
use serde::{Deserialize, Serialize};

use crate::http::client::{request_origin, ClientAddr};
use crate::http::edit_token;
use crate::http::error::ApiError;
use crate::http::middleware::admin_auth::is_https;
use crate::replies::{fetch_replies, FetchParams};
use crate::state::AppState;
use crate::submission::{submit, Submission};

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub uri: Option<String>,
    pub parent: Option<i64>,
    pub limit: Option<i64>,
    pub nested_limit: Option<i64>,
    pub after: Option<f64>,
    pub plain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UriQuery {
    pub uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlainQuery {
    pub plain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewCommentBody {
    pub text: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub parent: Option<i64>,
    pub title: Option<String>,
    /// Non-zero asks for reply notifications.
    pub notification: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EditBody {
    pub text: String,
    pub author: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoteBody {
    pub likes: i64,
    pub dislikes: i64,
}

pub async fn fetch(
    State(state): State<AppState>,
    Query(request): Query<FetchRequest>,
) -> Result<Json<ReplyPage>, ApiError> {
    let uri = required_uri(request.uri)?;
    let params = FetchParams {
        uri,
        parent: request.parent,
        after: request.after.unwrap_or(0.0),
        limit: request.limit,
        nested_limit: request.nested_limit,
        plain: parse_plain(request.plain.as_deref())?,
    };
    let page = fetch_replies(&state.db, &state.renderer, &params).await?;
    Ok(Json(page))
}

pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<UriQuery>,
    ClientAddr(remote_addr): ClientAddr,
    headers: HeaderMap,
    Json(body): Json<NewCommentBody>,
) -> Result<Response, ApiError> {
    let uri = required_uri(query.uri)?;
    let submission = Submission {
        uri,
        title: body.title,
        origin: request_origin(&headers),
        comment: NewComment {
            parent: body.parent,
            mode: Mode::Accepted,
            remote_addr,
            text: body.text,
            author: body.author,
            email: body.email,
            website: body.website,
            notification: body.notification.unwrap_or(0) != 0,
        },
    };
    let submitted = submit(&state, submission).await?;
    let comment = submitted.comment;
    let status = match comment.mode {
        Mode::Moderation => StatusCode::ACCEPTED,
        _ => StatusCode::CREATED,
    };
    let view = state.renderer.view(&comment, false);
    let response = (status, Json(view)).into_response();
    Ok(with_edit_token(&state, &headers, response, &comment))
}

pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PlainQuery>,
) -> Result<Json<ReplyView>, ApiError> {
    let comment = get_comment(&state.db, id).await?;
    let plain = parse_plain(query.plain.as_deref())?;
    Ok(Json(state.renderer.view(&comment, plain)))
}

pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<EditBody>,
) -> Result<Response, ApiError> {
    let comment = get_comment(&state.db, id).await?;
    authorize(&state, &headers, &comment)?;
    let edit = CommentEdit {
        text: body.text,
        author: body.author,
        website: body.website,
    }
    .validated()?;
    let edit = CommentEdit {
        author: edit.author.map(|author| ammonia::clean_text(&author)),
        ..edit
    };

    let updated = update_comment(&state.db, id, &edit).await?;
    state.events.publish(Event::CommentEdited(updated.clone()));
    let response = Json(state.renderer.view(&updated, false)).into_response();
    Ok(with_edit_token(&state, &headers, response, &updated))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let comment = get_comment(&state.db, id).await?;
    authorize(&state, &headers, &comment)?;

    let placeholder = delete_comment(&state.db, id).await?;
    state.events.publish(Event::CommentDeleted { id });
    let body = placeholder.map(|comment| state.renderer.view(&comment, false));
    Ok(edit_token::expire(
        Json(body).into_response(),
        id,
        is_https(&headers),
    ))
}

pub async fn like(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ClientAddr(remote_addr): ClientAddr,
) -> Result<Json<VoteBody>, ApiError> {
    vote(&state, id, &remote_addr, true).await
}

pub async fn dislike(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ClientAddr(remote_addr): ClientAddr,
) -> Result<Json<VoteBody>, ApiError> {
    vote(&state, id, &remote_addr, false).await
}

pub async fn count(
    State(state): State<AppState>,
    Json(uris): Json<Vec<String>>,
) -> Result<Json<Vec<i64>>, ApiError> {
    Ok(Json(count_comments(&state.db, &uris).await?))
}

async fn vote(
    state: &AppState,
    id: i64,
    remote_addr: &str,
    upvote: bool,
) -> Result<Json<VoteBody>, ApiError> {
    let outcome = vote_comment(&state.db, id, remote_addr, upvote).await?;
    if outcome.counted {
        state.events.publish(Event::CommentVoted {
            id,
            upvote,
            likes: outcome.likes,
            dislikes: outcome.dislikes,
        });
    }
    Ok(Json(VoteBody {
        likes: outcome.likes,
        dislikes: outcome.dislikes,
    }))
}

/// Edits and deletes need the edit cookie issued for the comment's current
/// text, and only while the edit window is open.
fn authorize(state: &AppState, headers: &HeaderMap, comment: &Comment) -> Result<(), ApiError> {
    let token = edit_token::extract(headers, comment.id)
        .ok_or_else(|| ApiError::Forbidden("edit cookie missing".to_string()))?;
    if !edit_token::verify(&state.session_key, comment.id, &comment.text, &token) {
        return Err(ApiError::Forbidden("edit cookie invalid".to_string()));
    }
    if now_secs() >= comment.created + state.config.edit_max_age.as_secs_f64() {
        return Err(ApiError::Forbidden("edit time frame has expired".to_string()));
    }
    Ok(())
}

fn with_edit_token(
    state: &AppState,
    headers: &HeaderMap,
    response: Response,
    comment: &Comment,
) -> Response {
    let token = edit_token::issue(&state.session_key, comment.id, &comment.text);
    edit_token::attach(
        response,
        comment.id,
        &token,
        state.config.edit_max_age.as_secs(),
        is_https(headers),
    )
}

fn required_uri(uri: Option<String>) -> Result<String, ApiError> {
    uri.map(|uri| uri.trim().to_string())
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| ApiError::BadRequest("uri is required".to_string()))
}

/// `plain` is `0` or `1`; absent means rendered.
fn parse_plain(value: Option<&str>) -> Result<bool, ApiError> {
    match value.map(str::trim) {
        None | Some("0") => Ok(false),
        Some("1") => Ok(true),
        Some(_) => Err(ApiError::BadRequest("plain must be 0 or 1".to_string())),
    }
}
