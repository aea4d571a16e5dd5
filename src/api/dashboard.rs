use axum::extract::State;

use super::AppState;
use crate::{
    error::{ApiError, ApiResult},
    extractors::{PathParams, parse_id},
    lifecycle::blocking,
    models::{ChannelStats, Principal, Video},
    response::ApiResponse,
};

const INVALID_CHANNEL_ID: &str = "Invalid channel ID";

pub(super) async fn channel_stats(
    State(state): State<AppState>,
    _principal: Principal,
    PathParams(channel_id): PathParams<String>,
) -> ApiResult<ApiResponse<ChannelStats>> {
    let channel_id = parse_id(&channel_id, INVALID_CHANNEL_ID)?;
    let db = state.db.clone();
    let stats = blocking(move || db.channel_stats(channel_id)).await?;
    Ok(ApiResponse::ok(stats, "Channel stats retrieved successfully"))
}

pub(super) async fn channel_videos(
    State(state): State<AppState>,
    _principal: Principal,
    PathParams(channel_id): PathParams<String>,
) -> ApiResult<ApiResponse<Vec<Video>>> {
    let channel_id = parse_id(&channel_id, INVALID_CHANNEL_ID)?;
    let db = state.db.clone();
    let videos = blocking(move || db.list_channel_videos(channel_id)).await?;
    if videos.is_empty() {
        return Err(ApiError::not_found("No videos found for this channel"));
    }
    Ok(ApiResponse::ok(videos, "Channel videos retrieved successfully"))
}
