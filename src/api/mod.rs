//! HTTP surface: shared state, the route table and the resource handlers.
//!
//! Every route under `/api/v1` answers with an [`ApiResponse`] or an
//! [`ApiError`](crate::error::ApiError) envelope. Handlers that take a
//! [`Principal`](crate::models::Principal) argument are behind the auth
//! guard.

mod comments;
mod dashboard;
mod likes;
mod media;
mod playlists;
mod subscriptions;
mod videos;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};
use serde::Serialize;

use crate::{
    auth::TokenService,
    config::AppConfig,
    lifecycle::{ErrorFormatting, route_not_found, with_lifecycle},
    response::ApiResponse,
    storage::{LocalObjectStore, ObjectStore},
    store::Database,
};

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub tokens: Arc<TokenService>,
    pub objects: Arc<dyn ObjectStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Opens the database and wires the collaborators described by `config`.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let db = Database::open(&config.database_path)?;
        let objects = LocalObjectStore::new(&config.media_root, config.public_base_url.clone());
        Ok(Self::new(config, db, Arc::new(objects)))
    }

    pub fn new(config: AppConfig, db: Database, objects: Arc<dyn ObjectStore>) -> Self {
        let tokens = TokenService::new(&config.access_token_secret, config.access_token_ttl);
        Self {
            db: Arc::new(db),
            tokens: Arc::new(tokens),
            objects,
            config: Arc::new(config),
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/videos", get(videos::list_videos).post(videos::publish_video))
        .route(
            "/videos/{video_id}",
            get(videos::get_video)
                .patch(videos::update_video)
                .delete(videos::delete_video),
        )
        .route("/videos/toggle/publish/{video_id}", patch(videos::toggle_publish))
        .route(
            "/comments/{video_id}",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route(
            "/comments/c/{comment_id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        .route("/likes/toggle/v/{video_id}", post(likes::toggle_video_like))
        .route("/likes/toggle/c/{comment_id}", post(likes::toggle_comment_like))
        .route("/likes/videos", get(likes::liked_videos))
        .route("/playlist", post(playlists::create_playlist))
        .route("/playlist/user/{user_id}", get(playlists::user_playlists))
        .route(
            "/playlist/{playlist_id}",
            get(playlists::get_playlist)
                .patch(playlists::update_playlist)
                .delete(playlists::delete_playlist),
        )
        .route(
            "/playlist/add/{video_id}/{playlist_id}",
            patch(playlists::add_video),
        )
        .route(
            "/playlist/remove/{video_id}/{playlist_id}",
            patch(playlists::remove_video),
        )
        .route(
            "/subscriptions/c/{channel_id}",
            get(subscriptions::channel_subscribers).post(subscriptions::toggle_subscription),
        )
        .route("/subscriptions/u", get(subscriptions::subscribed_channels))
        .route("/dashboard/stats/{channel_id}", get(dashboard::channel_stats))
        .route("/dashboard/videos/{channel_id}", get(dashboard::channel_videos))
}

/// Builds the complete application, lifecycle layers included.
pub fn router(state: AppState) -> Router {
    let formatting = ErrorFormatting {
        debug: state.config.debug_errors,
    };
    let body_limit = state.config.max_upload_bytes;

    let app = Router::new()
        .nest(API_PREFIX, api_routes())
        .route("/media/{file}", get(media::serve_media))
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    with_lifecycle(app, formatting)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn healthcheck() -> ApiResponse<Health> {
    ApiResponse::ok(Health { status: "ok" }, "OK")
}
