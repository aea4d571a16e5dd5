use axum::extract::State;

use super::AppState;
use crate::{
    error::{ApiError, ApiResult},
    extractors::{PathParams, parse_id},
    lifecycle::blocking,
    models::{LikeStatus, LikeTarget, Principal, Video},
    response::ApiResponse,
};

const LIKE_TOGGLED: &str = "Like toggled successfully";

/// Existence check then toggle. `None` from the store means the target is
/// gone and maps to the target's 404.
async fn toggle(state: AppState, principal: Principal, target: LikeTarget) -> ApiResult<LikeStatus> {
    let db = state.db.clone();
    let actor = principal.id();
    let status = blocking(move || {
        let exists = match target {
            LikeTarget::Video(id) => db.find_video(id)?.is_some(),
            LikeTarget::Comment(id) => db.find_comment(id)?.is_some(),
        };
        if !exists {
            return Ok(None);
        }
        db.toggle_like(actor, target).map(Some)
    })
    .await?
    .ok_or_else(|| {
        ApiError::not_found(match target {
            LikeTarget::Video(_) => "Video not found",
            LikeTarget::Comment(_) => "Comment not found",
        })
    })?;

    tracing::debug!(actor = %actor, ?target, liked = status.is_liked, "toggled like");
    Ok(status)
}

pub(super) async fn toggle_video_like(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(video_id): PathParams<String>,
) -> ApiResult<ApiResponse<LikeStatus>> {
    let video_id = parse_id(&video_id, "Invalid video ID")?;
    let status = toggle(state, principal, LikeTarget::Video(video_id)).await?;
    Ok(ApiResponse::ok(status, LIKE_TOGGLED))
}

pub(super) async fn toggle_comment_like(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(comment_id): PathParams<String>,
) -> ApiResult<ApiResponse<LikeStatus>> {
    let comment_id = parse_id(&comment_id, "Invalid comment ID")?;
    let status = toggle(state, principal, LikeTarget::Comment(comment_id)).await?;
    Ok(ApiResponse::ok(status, LIKE_TOGGLED))
}

pub(super) async fn liked_videos(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<ApiResponse<Vec<Video>>> {
    let db = state.db.clone();
    let actor = principal.id();
    let videos = blocking(move || db.liked_videos(actor)).await?;
    Ok(ApiResponse::ok(videos, "Liked videos fetched successfully"))
}
