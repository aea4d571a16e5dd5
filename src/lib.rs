#![forbid(unsafe_code)]

//! Backend for a video-sharing service: videos, comments, likes, playlists,
//! subscriptions and channel dashboards behind a JSON envelope API.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod id;
pub mod lifecycle;
pub mod models;
pub mod response;
pub mod security;
pub mod storage;
pub mod store;
pub mod telemetry;
