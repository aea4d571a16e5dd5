use axum::extract::State;
use serde::Deserialize;

use super::AppState;
use crate::{
    error::{ApiError, ApiResult},
    extractors::{JsonBody, PathParams, parse_id},
    id::ObjectId,
    lifecycle::blocking,
    models::{Playlist, Principal, Video},
    response::ApiResponse,
    store::PlaylistInsert,
};

const INVALID_PLAYLIST_ID: &str = "Invalid playlist ID";
const INVALID_ENTRY_IDS: &str = "Invalid playlist ID or video ID";
const PLAYLIST_NOT_FOUND: &str = "Playlist not found";
const NOT_PLAYLIST_OWNER: &str = "You are not authorized to modify this playlist";

#[derive(Debug, Deserialize)]
pub(super) struct PlaylistBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl PlaylistBody {
    fn fields(&self) -> ApiResult<(String, String)> {
        let clean = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };
        match (clean(&self.name), clean(&self.description)) {
            (Some(name), Some(description)) => Ok((name, description)),
            _ => Err(ApiError::bad_request("Name and description are required")),
        }
    }
}

/// Loads a playlist and checks that `principal` owns it.
async fn owned_playlist(
    state: &AppState,
    principal: &Principal,
    playlist_id: ObjectId,
) -> ApiResult<Playlist> {
    let db = state.db.clone();
    let playlist = blocking(move || db.find_playlist(playlist_id))
        .await?
        .ok_or_else(|| ApiError::not_found(PLAYLIST_NOT_FOUND))?;
    if playlist.owner != principal.id() {
        return Err(ApiError::forbidden(NOT_PLAYLIST_OWNER));
    }
    Ok(playlist)
}

fn parse_entry_ids(video_id: &str, playlist_id: &str) -> ApiResult<(ObjectId, ObjectId)> {
    match (ObjectId::parse(video_id), ObjectId::parse(playlist_id)) {
        (Ok(video), Ok(playlist)) => Ok((video, playlist)),
        _ => Err(ApiError::bad_request(INVALID_ENTRY_IDS)),
    }
}

pub(super) async fn create_playlist(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(body): JsonBody<PlaylistBody>,
) -> ApiResult<ApiResponse<Playlist>> {
    let (name, description) = body.fields()?;
    let db = state.db.clone();
    let owner = principal.id();
    let playlist = blocking(move || db.insert_playlist(owner, &name, &description)).await?;
    Ok(ApiResponse::created(playlist, "Playlist created successfully"))
}

pub(super) async fn user_playlists(
    State(state): State<AppState>,
    PathParams(user_id): PathParams<String>,
) -> ApiResult<ApiResponse<Vec<Playlist>>> {
    let user_id = parse_id(&user_id, "Invalid user ID")?;
    let db = state.db.clone();
    let playlists = blocking(move || db.list_user_playlists(user_id)).await?;
    if playlists.is_empty() {
        return Err(ApiError::not_found("No playlists found for this user"));
    }
    Ok(ApiResponse::ok(playlists, "Playlists retrieved successfully"))
}

pub(super) async fn get_playlist(
    State(state): State<AppState>,
    PathParams(playlist_id): PathParams<String>,
) -> ApiResult<ApiResponse<Playlist<Video>>> {
    let playlist_id = parse_id(&playlist_id, INVALID_PLAYLIST_ID)?;
    let db = state.db.clone();
    let playlist = blocking(move || db.find_playlist_with_videos(playlist_id))
        .await?
        .ok_or_else(|| ApiError::not_found(PLAYLIST_NOT_FOUND))?;
    Ok(ApiResponse::ok(playlist, "Playlist retrieved successfully"))
}

pub(super) async fn update_playlist(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(playlist_id): PathParams<String>,
    JsonBody(body): JsonBody<PlaylistBody>,
) -> ApiResult<ApiResponse<Playlist<Video>>> {
    let playlist_id = parse_id(&playlist_id, INVALID_PLAYLIST_ID)?;
    let (name, description) = body.fields()?;
    owned_playlist(&state, &principal, playlist_id).await?;

    let db = state.db.clone();
    let owner = principal.id();
    let playlist = blocking(move || db.update_playlist(playlist_id, owner, &name, &description))
        .await?
        .ok_or_else(|| ApiError::not_found(PLAYLIST_NOT_FOUND))?;
    Ok(ApiResponse::ok(playlist, "Playlist updated successfully"))
}

pub(super) async fn delete_playlist(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(playlist_id): PathParams<String>,
) -> ApiResult<ApiResponse<Playlist>> {
    let playlist_id = parse_id(&playlist_id, INVALID_PLAYLIST_ID)?;
    owned_playlist(&state, &principal, playlist_id).await?;

    let db = state.db.clone();
    let owner = principal.id();
    let deleted = blocking(move || db.delete_playlist(playlist_id, owner))
        .await?
        .ok_or_else(|| ApiError::not_found(PLAYLIST_NOT_FOUND))?;
    Ok(ApiResponse::ok(deleted, "Playlist deleted successfully"))
}

pub(super) async fn add_video(
    State(state): State<AppState>,
    principal: Principal,
    PathParams((video_id, playlist_id)): PathParams<(String, String)>,
) -> ApiResult<ApiResponse<Playlist<Video>>> {
    let (video_id, playlist_id) = parse_entry_ids(&video_id, &playlist_id)?;
    owned_playlist(&state, &principal, playlist_id).await?;

    let db = state.db.clone();
    let outcome = blocking(move || match db.find_video(video_id)? {
        Some(_) => db.add_video_to_playlist(playlist_id, video_id).map(Some),
        None => Ok(None),
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Video not found"))?;
    if outcome == PlaylistInsert::AlreadyPresent {
        return Err(ApiError::bad_request("Video already exists in the playlist"));
    }

    let playlist = reload(&state, playlist_id).await?;
    Ok(ApiResponse::ok(playlist, "Video added to playlist successfully"))
}

pub(super) async fn remove_video(
    State(state): State<AppState>,
    principal: Principal,
    PathParams((video_id, playlist_id)): PathParams<(String, String)>,
) -> ApiResult<ApiResponse<Playlist<Video>>> {
    let (video_id, playlist_id) = parse_entry_ids(&video_id, &playlist_id)?;
    owned_playlist(&state, &principal, playlist_id).await?;

    let db = state.db.clone();
    if !blocking(move || db.remove_video_from_playlist(playlist_id, video_id)).await? {
        return Err(ApiError::not_found("Video is not in the playlist"));
    }

    let playlist = reload(&state, playlist_id).await?;
    Ok(ApiResponse::ok(playlist, "Video removed from playlist successfully"))
}

async fn reload(state: &AppState, playlist_id: ObjectId) -> ApiResult<Playlist<Video>> {
    let db = state.db.clone();
    blocking(move || db.find_playlist_with_videos(playlist_id))
        .await?
        .ok_or_else(|| ApiError::not_found(PLAYLIST_NOT_FOUND))
}
