use axum::extract::State;
use serde::Deserialize;

use super::AppState;
use crate::{
    error::{ApiError, ApiResult},
    extractors::{JsonBody, PathParams, QueryParams, parse_id},
    id::ObjectId,
    lifecycle::blocking,
    models::{Comment, CommentPage, Principal},
    response::ApiResponse,
};

const INVALID_COMMENT_ID: &str = "Invalid comment ID";
const COMMENT_NOT_FOUND: &str = "Comment not found";

#[derive(Debug, Default, Deserialize)]
pub(super) struct PageParams {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommentBody {
    #[serde(default)]
    content: Option<String>,
}

impl CommentBody {
    fn content(&self) -> ApiResult<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ApiError::bad_request("Comment content is required"))
    }
}

pub(super) async fn list_comments(
    State(state): State<AppState>,
    PathParams(video_id): PathParams<String>,
    QueryParams(params): QueryParams<PageParams>,
) -> ApiResult<ApiResponse<CommentPage>> {
    let video_id = parse_id(&video_id, "Invalid video ID")?;
    let db = state.db.clone();
    let page = blocking(move || {
        db.list_comments(video_id, params.page.unwrap_or(1), params.limit.unwrap_or(10))
    })
    .await?;
    Ok(ApiResponse::ok(page, "Comments fetched successfully"))
}

pub(super) async fn add_comment(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(video_id): PathParams<String>,
    JsonBody(body): JsonBody<CommentBody>,
) -> ApiResult<ApiResponse<Comment>> {
    let video_id = parse_id(&video_id, "Invalid video ID")?;
    let content = body.content()?.to_string();

    let db = state.db.clone();
    let owner = principal.id();
    let comment = blocking(move || match db.find_video(video_id)? {
        Some(_) => db.insert_comment(video_id, owner, &content).map(Some),
        None => Ok(None),
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

/// Loads a comment and checks that `principal` wrote it.
async fn owned_comment(
    state: &AppState,
    principal: &Principal,
    comment_id: ObjectId,
    forbidden: &'static str,
) -> ApiResult<Comment> {
    let db = state.db.clone();
    let comment = blocking(move || db.find_comment(comment_id))
        .await?
        .ok_or_else(|| ApiError::not_found(COMMENT_NOT_FOUND))?;
    if comment.owner != principal.id() {
        return Err(ApiError::forbidden(forbidden));
    }
    Ok(comment)
}

pub(super) async fn update_comment(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(comment_id): PathParams<String>,
    JsonBody(body): JsonBody<CommentBody>,
) -> ApiResult<ApiResponse<Comment>> {
    let comment_id = parse_id(&comment_id, INVALID_COMMENT_ID)?;
    let content = body.content()?.to_string();
    let comment = owned_comment(
        &state,
        &principal,
        comment_id,
        "You are not authorized to update this comment",
    )
    .await?;

    let db = state.db.clone();
    let (id, owner) = (comment.id, principal.id());
    let updated = blocking(move || db.update_comment(id, owner, &content))
        .await?
        .ok_or_else(|| ApiError::not_found(COMMENT_NOT_FOUND))?;
    Ok(ApiResponse::ok(updated, "Comment updated successfully"))
}

pub(super) async fn delete_comment(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(comment_id): PathParams<String>,
) -> ApiResult<ApiResponse<Comment>> {
    let comment_id = parse_id(&comment_id, INVALID_COMMENT_ID)?;
    let comment = owned_comment(
        &state,
        &principal,
        comment_id,
        "You are not authorized to delete this comment",
    )
    .await?;

    let db = state.db.clone();
    let (id, owner) = (comment.id, principal.id());
    let deleted = blocking(move || db.delete_comment(id, owner))
        .await?
        .ok_or_else(|| ApiError::not_found(COMMENT_NOT_FOUND))?;
    Ok(ApiResponse::ok(deleted, "Comment deleted successfully"))
}
