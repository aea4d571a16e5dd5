use axum::extract::State;
use serde::Serialize;

use super::AppState;
use crate::{
    error::{ApiError, ApiResult},
    extractors::{PathParams, parse_id},
    id::ObjectId,
    lifecycle::blocking,
    models::{Principal, Subscription, UserSummary},
    response::ApiResponse,
};

const INVALID_CHANNEL_ID: &str = "Invalid channel ID";
const CHANNEL_NOT_FOUND: &str = "Channel not found";

#[derive(Debug, Serialize)]
pub(super) struct SubscriptionState {
    subscribed: bool,
}

pub(super) async fn toggle_subscription(
    State(state): State<AppState>,
    principal: Principal,
    PathParams(channel_id): PathParams<String>,
) -> ApiResult<ApiResponse<SubscriptionState>> {
    let channel_id = parse_id(&channel_id, INVALID_CHANNEL_ID)?;

    let db = state.db.clone();
    let channel = blocking(move || db.find_user_summary(channel_id)).await?;
    if channel.is_none() {
        return Err(ApiError::not_found(CHANNEL_NOT_FOUND));
    }
    if channel_id == principal.id() {
        return Err(ApiError::bad_request("Users cannot subscribe to themselves"));
    }

    let db = state.db.clone();
    let subscriber = principal.id();
    let subscribed = blocking(move || db.toggle_subscription(subscriber, channel_id)).await?;
    tracing::debug!(subscriber = %subscriber, channel = %channel_id, subscribed, "toggled subscription");

    let body = SubscriptionState { subscribed };
    Ok(if subscribed {
        ApiResponse::created(body, "Successfully subscribed to the channel")
    } else {
        ApiResponse::ok(body, "Successfully unsubscribed from the channel")
    })
}

pub(super) async fn channel_subscribers(
    State(state): State<AppState>,
    PathParams(channel_id): PathParams<String>,
) -> ApiResult<ApiResponse<Vec<Subscription<UserSummary, ObjectId>>>> {
    let channel_id = parse_id(&channel_id, INVALID_CHANNEL_ID)?;
    let db = state.db.clone();
    let subscribers = blocking(move || match db.find_user_summary(channel_id)? {
        Some(_) => db.list_subscribers(channel_id).map(Some),
        None => Ok(None),
    })
    .await?
    .ok_or_else(|| ApiError::not_found(CHANNEL_NOT_FOUND))?;
    Ok(ApiResponse::ok(subscribers, "Subscribers fetched successfully"))
}

pub(super) async fn subscribed_channels(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<ApiResponse<Vec<Subscription<ObjectId, UserSummary>>>> {
    let db = state.db.clone();
    let subscriber = principal.id();
    let channels = blocking(move || db.list_subscribed_channels(subscriber)).await?;
    Ok(ApiResponse::ok(channels, "Subscribed channels fetched successfully"))
}
