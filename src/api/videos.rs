use std::sync::Arc;

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tokio::task;

use super::AppState;
use crate::{
    error::{ApiError, ApiResult},
    extractors::{MultipartForm, PathParams, QueryParams, UploadedFile, parse_id},
    lifecycle::blocking,
    models::{
        NewVideo, Page, Principal, SortDirection, UserSummary, Video, VideoPatch, VideoQuery,
        VideoSortField,
    },
    response::ApiResponse,
    storage::{ObjectStore, StoredObject},
};

const INVALID_VIDEO_ID: &str = "Invalid video ID";
const VIDEO_NOT_FOUND: &str = "Video not found";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ListVideosParams {
    page: Option<u32>,
    limit: Option<u32>,
    query: Option<String>,
    sort_by: Option<String>,
    sort_type: Option<i32>,
    user_id: Option<String>,
}

impl ListVideosParams {
    fn into_query(self) -> ApiResult<VideoQuery> {
        let defaults = VideoQuery::default();
        let sort_by = match self.sort_by.as_deref() {
            None | Some("") => VideoSortField::default(),
            Some(raw) => VideoSortField::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("Cannot sort videos by {raw}")))?,
        };
        let direction = match self.sort_type {
            None | Some(-1) => SortDirection::Descending,
            Some(1) => SortDirection::Ascending,
            Some(_) => return Err(ApiError::bad_request("sortType must be 1 or -1")),
        };
        let owner = self
            .user_id
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(|raw| parse_id(raw, "Invalid user ID"))
            .transpose()?;

        Ok(VideoQuery {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
            title_contains: self.query.filter(|q| !q.trim().is_empty()),
            owner,
            sort_by,
            direction,
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct Empty {}

/// Hands a spooled upload to the object store on the blocking pool. The
/// temporary file is removed once the upload returns.
async fn store_upload(
    objects: Arc<dyn ObjectStore>,
    file: UploadedFile,
    failure: &'static str,
) -> ApiResult<StoredObject> {
    task::spawn_blocking(move || objects.upload(file.path(), file.file_name.as_deref()))
        .await
        .map_err(|err| ApiError::upstream(failure, format!("task join error: {err}")))?
        .map_err(|err| ApiError::upstream(failure, format!("{:#}", anyhow::Error::new(err))))
}

pub(super) async fn list_videos(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListVideosParams>,
) -> ApiResult<ApiResponse<Page<Video>>> {
    let query = params.into_query()?;
    let db = state.db.clone();
    let page = blocking(move || db.list_published_videos(&query)).await?;
    Ok(ApiResponse::ok(page, "Videos fetched successfully"))
}

pub(super) async fn publish_video(
    State(state): State<AppState>,
    principal: Principal,
    mut form: MultipartForm,
) -> ApiResult<ApiResponse<Video>> {
    let (Some(video_file), Some(thumbnail)) = (form.take_file("video"), form.take_file("thumbnail"))
    else {
        return Err(ApiError::bad_request("Video and thumbnail files are required"));
    };
    let (Some(title), Some(description)) = (form.text("title"), form.text("description")) else {
        return Err(ApiError::bad_request("Title and description are required"));
    };
    let duration = match form.text("duration") {
        None => 0.0,
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value >= 0.0)
            .ok_or_else(|| ApiError::bad_request("Duration must be a non-negative number"))?,
    };

    let video_url = store_upload(state.objects.clone(), video_file, "Failed to upload files").await?;
    let thumbnail_url = store_upload(state.objects.clone(), thumbnail, "Failed to upload files").await?;

    let record = NewVideo {
        video_file: video_url.url,
        thumbnail: thumbnail_url.url,
        title: title.to_string(),
        description: description.to_string(),
        duration,
        owner: principal.id(),
    };
    let db = state.db.clone();
    let video = blocking(move || db.insert_video(&record)).await?;

    tracing::info!(video = %video.id, owner = %video.owner, "published video");
    Ok(ApiResponse::created(video, "Video published successfully"))
}

pub(super) async fn get_video(
    State(state): State<AppState>,
    PathParams(video_id): PathParams<String>,
) -> ApiResult<ApiResponse<Video<UserSummary>>> {
    let video_id = parse_id(&video_id, INVALID_VIDEO_ID)?;
    let db = state.db.clone();
    let video = blocking(move || db.find_video_with_owner(video_id))
        .await?
        .ok_or_else(|| ApiError::not_found(VIDEO_NOT_FOUND))?;
    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

/// Loads a video and checks that `principal` owns it.
async fn owned_video(
    state: &AppState,
    principal: &Principal,
    video_id: &str,
    forbidden: &'static str,
) -> ApiResult<Video> {
    let video_id = parse_id(video_id, INVALID_VIDEO_ID)?;
    let db = state.db.clone();
    let video = blocking(move || db.find_video(video_id))
        .await?
        .ok_or_else(|| ApiError::not_found(VIDEO_NOT_FOUND))?;
    if video.owner != principal.id() {
        return Err(ApiError::forbidden(forbidden));
    }
    Ok(video)
}

pub(super) async fn update_video(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(video_id): PathParams<String>,
    mut form: MultipartForm,
) -> ApiResult<ApiResponse<Video>> {
    let video = owned_video(
        &state,
        &principal,
        &video_id,
        "You are not authorized to update this video",
    )
    .await?;

    let thumbnail = match form.take_file("thumbnail") {
        Some(file) => Some(
            store_upload(state.objects.clone(), file, "Failed to upload new thumbnail")
                .await?
                .url,
        ),
        None => None,
    };
    let patch = VideoPatch {
        title: form.text("title").map(str::to_owned),
        description: form.text("description").map(str::to_owned),
        thumbnail,
    };
    if patch.is_empty() {
        return Ok(ApiResponse::ok(video, "Video updated successfully"));
    }

    let db = state.db.clone();
    let (id, owner) = (video.id, principal.id());
    let updated = blocking(move || db.update_video(id, owner, &patch))
        .await?
        .ok_or_else(|| ApiError::not_found(VIDEO_NOT_FOUND))?;
    Ok(ApiResponse::ok(updated, "Video updated successfully"))
}

pub(super) async fn delete_video(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(video_id): PathParams<String>,
) -> ApiResult<ApiResponse<Empty>> {
    let video = owned_video(
        &state,
        &principal,
        &video_id,
        "You are not authorized to delete this video",
    )
    .await?;

    let db = state.db.clone();
    let (id, owner) = (video.id, principal.id());
    if !blocking(move || db.delete_video(id, owner)).await? {
        return Err(ApiError::not_found(VIDEO_NOT_FOUND));
    }
    tracing::info!(video = %id, "deleted video");
    Ok(ApiResponse::ok(Empty {}, "Video deleted successfully"))
}

pub(super) async fn toggle_publish(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(video_id): PathParams<String>,
) -> ApiResult<ApiResponse<Video>> {
    let video = owned_video(
        &state,
        &principal,
        &video_id,
        "You are not authorized to toggle the publish status",
    )
    .await?;

    let db = state.db.clone();
    let (id, owner) = (video.id, principal.id());
    let video = blocking(move || db.toggle_video_published(id, owner))
        .await?
        .ok_or_else(|| ApiError::not_found(VIDEO_NOT_FOUND))?;
    Ok(ApiResponse::ok(video, "Video publish status updated successfully"))
}
