use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use super::{AppState, router};
use crate::{
    config::{AppConfig, LogFormat},
    id::ObjectId,
    models::{LikeTarget, NewUser, NewVideo, Principal, Video},
    storage::LocalObjectStore,
    store::Database,
};

const BOUNDARY: &str = "viewtube-test-boundary";

struct TestApp {
    _dir: TempDir,
    state: AppState,
    app: Router,
}

impl TestApp {
    fn new() -> Self {
        Self::with_debug(false)
    }

    fn with_debug(debug_errors: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            database_path: dir.path().join("db/viewtube.db"),
            media_root: dir.path().join("media"),
            public_base_url: "http://media.test".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            access_token_secret: "test-secret".into(),
            access_token_ttl: Duration::from_secs(600),
            max_upload_bytes: 1024 * 1024,
            debug_errors,
            log_format: LogFormat::Pretty,
        };
        let db = Database::open(&config.database_path).unwrap();
        let objects = LocalObjectStore::new(&config.media_root, config.public_base_url.clone());
        let state = AppState::new(config, db, Arc::new(objects));
        let app = router(state.clone());
        Self {
            _dir: dir,
            state,
            app,
        }
    }

    fn user(&self, username: &str) -> (Principal, String) {
        let principal = self
            .state
            .db
            .insert_user(&NewUser {
                username: username.into(),
                email: format!("{username}@example.test"),
                full_name: format!("{username} tester"),
                password_hash: "$argon2id$placeholder".into(),
                avatar: None,
            })
            .unwrap();
        let token = self.state.tokens.issue(&principal).unwrap();
        (principal, token)
    }

    fn video(&self, owner: &Principal, title: &str) -> Video {
        self.state
            .db
            .insert_video(&NewVideo {
                video_file: format!("http://media.test/media/{title}.mp4"),
                thumbnail: format!("http://media.test/media/{title}.jpg"),
                title: title.into(),
                description: format!("about {title}"),
                duration: 12.5,
                owner: owner.id(),
            })
            .unwrap()
    }

    fn connections(&self) -> usize {
        self.state.db.connections_opened()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(method, uri, token).body(Body::empty()).unwrap())
            .await
    }

    async fn call_json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send(
            request(method, uri, token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn call_multipart(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        parts: &[Part<'_>],
    ) -> (StatusCode, Value) {
        self.send(
            request(method, uri, token)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap(),
        )
        .await
    }
}

fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn assert_failure(status: StatusCode, body: &Value, expected: StatusCode, message: &str) {
    assert_eq!(status, expected, "body: {body}");
    assert_eq!(body["statusCode"], expected.as_u16());
    assert_eq!(body["success"], false);
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["message"], message);
    assert!(body["errors"].is_array());
    assert!(body.get("stack").is_none());
}

#[tokio::test]
async fn healthcheck_uses_the_success_envelope() {
    let ctx = TestApp::new();
    let (status, body) = ctx.call(Method::GET, "/api/v1/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"statusCode": 200, "success": true, "data": {"status": "ok"}, "message": "OK"})
    );
}

#[tokio::test]
async fn protected_routes_reject_missing_credentials() {
    let ctx = TestApp::new();
    let video_id = ObjectId::new();
    for (method, uri) in [
        (Method::POST, format!("/api/v1/likes/toggle/v/{video_id}")),
        (Method::GET, "/api/v1/likes/videos".to_string()),
        (Method::DELETE, format!("/api/v1/videos/{video_id}")),
        (Method::GET, "/api/v1/subscriptions/u".to_string()),
        (Method::GET, format!("/api/v1/dashboard/stats/{video_id}")),
    ] {
        let (status, body) = ctx.call(method, &uri, None).await;
        assert_failure(status, &body, StatusCode::UNAUTHORIZED, "Unauthorized request");
    }
    assert_eq!(ctx.connections(), 0);
}

#[tokio::test]
async fn bad_tokens_are_401_with_the_verification_reason() {
    let ctx = TestApp::new();
    let (status, body) = ctx
        .call(Method::GET, "/api/v1/likes/videos", Some("garbage"))
        .await;
    assert_failure(status, &body, StatusCode::UNAUTHORIZED, "jwt malformed");

    let foreign = crate::auth::TokenService::new("other-secret", Duration::from_secs(60));
    let (alice, _) = ctx.user("alice");
    let forged = foreign.issue(&alice).unwrap();
    let (status, body) = ctx
        .call(Method::GET, "/api/v1/likes/videos", Some(&forged))
        .await;
    assert_failure(status, &body, StatusCode::UNAUTHORIZED, "invalid signature");
}

#[tokio::test]
async fn tokens_for_unknown_users_are_rejected() {
    let ctx = TestApp::new();
    let (alice, token) = ctx.user("alice");
    ctx.state
        .db
        .with_connection(|conn| {
            conn.execute("DELETE FROM users WHERE id = ?1", [alice.id()])?;
            Ok(())
        })
        .unwrap();

    let (status, body) = ctx
        .call(Method::GET, "/api/v1/likes/videos", Some(&token))
        .await;
    assert_failure(status, &body, StatusCode::UNAUTHORIZED, "Invalid access token");
}

#[tokio::test]
async fn cookie_credentials_are_accepted() {
    let ctx = TestApp::new();
    let (_, token) = ctx.user("alice");
    let (status, body) = ctx
        .send(
            Request::builder()
                .uri("/api/v1/likes/videos")
                .header(header::COOKIE, format!("accessToken={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn malformed_ids_on_public_routes_never_reach_the_store() {
    let ctx = TestApp::new();
    for (uri, message) in [
        ("/api/v1/videos/not-an-id", "Invalid video ID"),
        ("/api/v1/comments/not-an-id", "Invalid video ID"),
        ("/api/v1/playlist/not-an-id", "Invalid playlist ID"),
        ("/api/v1/playlist/user/not-an-id", "Invalid user ID"),
        ("/api/v1/subscriptions/c/not-an-id", "Invalid channel ID"),
        ("/api/v1/videos?userId=xyz", "Invalid user ID"),
    ] {
        let (status, body) = ctx.call(Method::GET, uri, None).await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST, message);
    }
    assert_eq!(ctx.connections(), 0);
}

#[tokio::test]
async fn malformed_ids_on_protected_routes_only_cost_the_auth_lookup() {
    let ctx = TestApp::new();
    let (_, token) = ctx.user("alice");

    for (method, uri, message) in [
        (Method::POST, "/api/v1/likes/toggle/v/123", "Invalid video ID"),
        (Method::POST, "/api/v1/likes/toggle/c/123", "Invalid comment ID"),
        (Method::DELETE, "/api/v1/playlist/zzz", "Invalid playlist ID"),
        (Method::DELETE, "/api/v1/comments/c/zzz", "Invalid comment ID"),
        (Method::POST, "/api/v1/subscriptions/c/zzz", "Invalid channel ID"),
        (Method::GET, "/api/v1/dashboard/stats/zzz", "Invalid channel ID"),
        (
            Method::PATCH,
            "/api/v1/playlist/add/zzz/0123456789abcdef01234567",
            "Invalid playlist ID or video ID",
        ),
    ] {
        let before = ctx.connections();
        let (status, body) = ctx.call(method, uri, Some(&token)).await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST, message);
        assert_eq!(ctx.connections() - before, 1, "{uri}");
    }
}

#[tokio::test]
async fn like_toggle_round_trips_over_http() {
    let ctx = TestApp::new();
    let (maker, _) = ctx.user("maker");
    let (_, fan_token) = ctx.user("fan");
    let video = ctx.video(&maker, "intro");
    let uri = format!("/api/v1/likes/toggle/v/{}", video.id);

    let (status, body) = ctx.call(Method::POST, &uri, Some(&fan_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Like toggled successfully");
    assert_eq!(body["data"], json!({"isLiked": true, "likesCount": 1}));

    let (_, body) = ctx.call(Method::GET, "/api/v1/likes/videos", Some(&fan_token)).await;
    assert_eq!(body["data"][0]["_id"], video.id.to_string());

    let (_, body) = ctx.call(Method::POST, &uri, Some(&fan_token)).await;
    assert_eq!(body["data"], json!({"isLiked": false, "likesCount": 0}));
    assert_eq!(ctx.state.db.count_likes(LikeTarget::Video(video.id)).unwrap(), 0);
}

#[tokio::test]
async fn liking_a_missing_target_is_404() {
    let ctx = TestApp::new();
    let (_, token) = ctx.user("fan");
    let (status, body) = ctx
        .call(
            Method::POST,
            &format!("/api/v1/likes/toggle/v/{}", ObjectId::new()),
            Some(&token),
        )
        .await;
    assert_failure(status, &body, StatusCode::NOT_FOUND, "Video not found");

    let (status, body) = ctx
        .call(
            Method::POST,
            &format!("/api/v1/likes/toggle/c/{}", ObjectId::new()),
            Some(&token),
        )
        .await;
    assert_failure(status, &body, StatusCode::NOT_FOUND, "Comment not found");
}

#[tokio::test]
async fn deleting_an_absent_playlist_is_404() {
    let ctx = TestApp::new();
    let (_, token) = ctx.user("curator");
    let (status, body) = ctx
        .call(
            Method::DELETE,
            &format!("/api/v1/playlist/{}", ObjectId::new()),
            Some(&token),
        )
        .await;
    assert_failure(status, &body, StatusCode::NOT_FOUND, "Playlist not found");
}

#[tokio::test]
async fn non_owners_cannot_update_videos() {
    let ctx = TestApp::new();
    let (maker, _) = ctx.user("maker");
    let (_, intruder_token) = ctx.user("intruder");
    let video = ctx.video(&maker, "original");

    let (status, body) = ctx
        .call_multipart(
            Method::PATCH,
            &format!("/api/v1/videos/{}", video.id),
            Some(&intruder_token),
            &[
                Part::Text("title", "defaced"),
                Part::File("thumbnail", "evil.png", b"pixels"),
            ],
        )
        .await;
    assert_failure(
        status,
        &body,
        StatusCode::FORBIDDEN,
        "You are not authorized to update this video",
    );

    let stored = ctx.state.db.find_video(video.id).unwrap().unwrap();
    assert_eq!(stored, video);
}

#[tokio::test]
async fn owners_update_videos_partially() {
    let ctx = TestApp::new();
    let (maker, token) = ctx.user("maker");
    let video = ctx.video(&maker, "original");

    let (status, body) = ctx
        .call_multipart(
            Method::PATCH,
            &format!("/api/v1/videos/{}", video.id),
            Some(&token),
            &[
                Part::Text("title", "Renamed"),
                Part::File("thumbnail", "new.png", b"pixels"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Video updated successfully");
    assert_eq!(body["data"]["title"], "Renamed");
    assert_eq!(body["data"]["description"], "about original");
    let thumbnail = body["data"]["thumbnail"].as_str().unwrap();
    assert!(thumbnail.starts_with("http://media.test/media/"));
    assert!(thumbnail.ends_with(".png"));
}

#[tokio::test]
async fn publishing_stores_both_files_and_serves_them() {
    let ctx = TestApp::new();
    let (_, token) = ctx.user("maker");

    let (status, body) = ctx
        .call_multipart(
            Method::POST,
            "/api/v1/videos",
            Some(&token),
            &[
                Part::Text("title", "First upload"),
                Part::Text("description", "hello"),
                Part::Text("duration", "42.5"),
                Part::File("video", "clip.mp4", b"frames"),
                Part::File("thumbnail", "thumb.jpg", b"pixels"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Video published successfully");
    assert_eq!(body["data"]["duration"], 42.5);
    assert_eq!(body["data"]["isPublished"], true);

    let url = body["data"]["videoFile"].as_str().unwrap();
    let path = url.strip_prefix("http://media.test").unwrap();
    let response = ctx
        .app
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"frames");

    let (_, listing) = ctx.call(Method::GET, "/api/v1/videos", None).await;
    assert_eq!(listing["data"]["totalDocs"], 1);
    assert_eq!(listing["data"]["docs"][0]["title"], "First upload");
}

#[tokio::test]
async fn publishing_requires_both_files() {
    let ctx = TestApp::new();
    let (_, token) = ctx.user("maker");
    let (status, body) = ctx
        .call_multipart(
            Method::POST,
            "/api/v1/videos",
            Some(&token),
            &[
                Part::Text("title", "No thumbnail"),
                Part::Text("description", "hello"),
                Part::File("video", "clip.mp4", b"frames"),
            ],
        )
        .await;
    assert_failure(
        status,
        &body,
        StatusCode::BAD_REQUEST,
        "Video and thumbnail files are required",
    );
}

#[tokio::test]
async fn media_route_rejects_traversal_and_missing_files() {
    let ctx = TestApp::new();
    let (status, body) = ctx.call(Method::GET, "/media/..%2Fsecret", None).await;
    assert_failure(status, &body, StatusCode::BAD_REQUEST, "Invalid media file name");

    let (status, body) = ctx.call(Method::GET, "/media/absent.mp4", None).await;
    assert_failure(status, &body, StatusCode::NOT_FOUND, "Media file not found");
}

#[tokio::test]
async fn video_details_populate_the_owner() {
    let ctx = TestApp::new();
    let (maker, _) = ctx.user("maker");
    let video = ctx.video(&maker, "intro");

    let (status, body) = ctx
        .call(Method::GET, &format!("/api/v1/videos/{}", video.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Video fetched successfully");
    assert_eq!(
        body["data"]["owner"],
        json!({"_id": maker.id().to_string(), "username": "maker", "fullName": "maker tester"})
    );

    let (status, body) = ctx
        .call(Method::GET, &format!("/api/v1/videos/{}", ObjectId::new()), None)
        .await;
    assert_failure(status, &body, StatusCode::NOT_FOUND, "Video not found");
}

#[tokio::test]
async fn unpublished_videos_leave_the_listing() {
    let ctx = TestApp::new();
    let (maker, token) = ctx.user("maker");
    let (_, other_token) = ctx.user("other");
    let video = ctx.video(&maker, "draft");
    let uri = format!("/api/v1/videos/toggle/publish/{}", video.id);

    let (status, body) = ctx.call(Method::PATCH, &uri, Some(&other_token)).await;
    assert_failure(
        status,
        &body,
        StatusCode::FORBIDDEN,
        "You are not authorized to toggle the publish status",
    );

    let (status, body) = ctx.call(Method::PATCH, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isPublished"], false);

    let (_, listing) = ctx.call(Method::GET, "/api/v1/videos", None).await;
    assert_eq!(listing["data"]["totalDocs"], 0);
    assert_eq!(listing["data"]["docs"], json!([]));
}

#[tokio::test]
async fn deleting_a_video_checks_ownership() {
    let ctx = TestApp::new();
    let (maker, token) = ctx.user("maker");
    let (_, other_token) = ctx.user("other");
    let video = ctx.video(&maker, "doomed");
    let uri = format!("/api/v1/videos/{}", video.id);

    let (status, body) = ctx.call(Method::DELETE, &uri, Some(&other_token)).await;
    assert_failure(
        status,
        &body,
        StatusCode::FORBIDDEN,
        "You are not authorized to delete this video",
    );

    let (status, body) = ctx.call(Method::DELETE, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({}));
    assert!(ctx.state.db.find_video(video.id).unwrap().is_none());
}

#[tokio::test]
async fn comments_are_owned_by_their_authors() {
    let ctx = TestApp::new();
    let (maker, maker_token) = ctx.user("maker");
    let (_, fan_token) = ctx.user("fan");
    let video = ctx.video(&maker, "intro");
    let comments_uri = format!("/api/v1/comments/{}", video.id);

    let (status, body) = ctx
        .call_json(Method::POST, &comments_uri, Some(&fan_token), json!({"content": "  "}))
        .await;
    assert_failure(status, &body, StatusCode::BAD_REQUEST, "Comment content is required");

    let (status, body) = ctx
        .call_json(Method::POST, &comments_uri, Some(&fan_token), json!({"content": "nice"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = body["data"]["_id"].as_str().unwrap().to_string();
    let comment_uri = format!("/api/v1/comments/c/{comment_id}");

    let (status, body) = ctx
        .call_json(Method::PATCH, &comment_uri, Some(&maker_token), json!({"content": "edited"}))
        .await;
    assert_failure(
        status,
        &body,
        StatusCode::FORBIDDEN,
        "You are not authorized to update this comment",
    );

    let (status, body) = ctx
        .call_json(Method::PATCH, &comment_uri, Some(&fan_token), json!({"content": "edited"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "edited");

    let (_, body) = ctx.call(Method::GET, &comments_uri, None).await;
    assert_eq!(body["data"]["totalComments"], 1);
    assert_eq!(body["data"]["comments"][0]["content"], "edited");

    let (status, _) = ctx.call(Method::DELETE, &comment_uri, Some(&fan_token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = ctx.call(Method::DELETE, &comment_uri, Some(&fan_token)).await;
    assert_failure(status, &body, StatusCode::NOT_FOUND, "Comment not found");
}

#[tokio::test]
async fn commenting_on_a_missing_video_is_404() {
    let ctx = TestApp::new();
    let (_, token) = ctx.user("fan");
    let (status, body) = ctx
        .call_json(
            Method::POST,
            &format!("/api/v1/comments/{}", ObjectId::new()),
            Some(&token),
            json!({"content": "hello?"}),
        )
        .await;
    assert_failure(status, &body, StatusCode::NOT_FOUND, "Video not found");
}

#[tokio::test]
async fn malformed_json_is_a_400_envelope() {
    let ctx = TestApp::new();
    let (_, token) = ctx.user("curator");
    let (status, body) = ctx
        .send(
            request(Method::POST, "/api/v1/playlist", Some(&token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_failure(status, &body, StatusCode::BAD_REQUEST, "Invalid request body");
}

#[tokio::test]
async fn playlist_lifecycle() {
    let ctx = TestApp::new();
    let (curator, token) = ctx.user("curator");
    let (_, other_token) = ctx.user("other");
    let video = ctx.video(&curator, "song");

    let (status, body) = ctx
        .call_json(Method::POST, "/api/v1/playlist", Some(&token), json!({"name": "Mix"}))
        .await;
    assert_failure(
        status,
        &body,
        StatusCode::BAD_REQUEST,
        "Name and description are required",
    );

    let (status, body) = ctx
        .call_json(
            Method::POST,
            "/api/v1/playlist",
            Some(&token),
            json!({"name": "Mix", "description": "favourites"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let playlist_id = body["data"]["_id"].as_str().unwrap().to_string();

    let add_uri = format!("/api/v1/playlist/add/{}/{playlist_id}", video.id);
    let (status, body) = ctx.call(Method::PATCH, &add_uri, Some(&other_token)).await;
    assert_failure(
        status,
        &body,
        StatusCode::FORBIDDEN,
        "You are not authorized to modify this playlist",
    );

    let (status, body) = ctx.call(Method::PATCH, &add_uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["videos"][0]["title"], "song");

    let (status, body) = ctx.call(Method::PATCH, &add_uri, Some(&token)).await;
    assert_failure(
        status,
        &body,
        StatusCode::BAD_REQUEST,
        "Video already exists in the playlist",
    );

    let (_, body) = ctx
        .call(Method::GET, &format!("/api/v1/playlist/user/{}", curator.id()), None)
        .await;
    assert_eq!(body["data"][0]["videos"], json!([video.id.to_string()]));

    let remove_uri = format!("/api/v1/playlist/remove/{}/{playlist_id}", video.id);
    let (status, _) = ctx.call(Method::PATCH, &remove_uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = ctx.call(Method::PATCH, &remove_uri, Some(&token)).await;
    assert_failure(status, &body, StatusCode::NOT_FOUND, "Video is not in the playlist");

    let (status, body) = ctx
        .call(Method::DELETE, &format!("/api/v1/playlist/{playlist_id}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Mix");

    let (status, body) = ctx
        .call(Method::GET, &format!("/api/v1/playlist/user/{}", curator.id()), None)
        .await;
    assert_failure(
        status,
        &body,
        StatusCode::NOT_FOUND,
        "No playlists found for this user",
    );
}

#[tokio::test]
async fn subscriptions_toggle_with_distinct_statuses() {
    let ctx = TestApp::new();
    let (channel, channel_token) = ctx.user("channel");
    let (_, fan_token) = ctx.user("fan");
    let uri = format!("/api/v1/subscriptions/c/{}", channel.id());

    let (status, body) = ctx.call(Method::POST, &uri, Some(&fan_token)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Successfully subscribed to the channel");
    assert_eq!(body["data"], json!({"subscribed": true}));

    let (_, body) = ctx.call(Method::GET, &uri, None).await;
    assert_eq!(body["data"][0]["subscriber"]["username"], "fan");

    let (_, body) = ctx.call(Method::GET, "/api/v1/subscriptions/u", Some(&fan_token)).await;
    assert_eq!(body["data"][0]["channel"]["username"], "channel");

    let (status, body) = ctx.call(Method::POST, &uri, Some(&fan_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully unsubscribed from the channel");

    let (status, body) = ctx.call(Method::POST, &uri, Some(&channel_token)).await;
    assert_failure(
        status,
        &body,
        StatusCode::BAD_REQUEST,
        "Users cannot subscribe to themselves",
    );

    let (status, body) = ctx
        .call(
            Method::POST,
            &format!("/api/v1/subscriptions/c/{}", ObjectId::new()),
            Some(&fan_token),
        )
        .await;
    assert_failure(status, &body, StatusCode::NOT_FOUND, "Channel not found");
}

#[tokio::test]
async fn dashboard_for_an_empty_channel() {
    let ctx = TestApp::new();
    let (channel, token) = ctx.user("quiet");

    let (status, body) = ctx
        .call(
            Method::GET,
            &format!("/api/v1/dashboard/stats/{}", channel.id()),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"totalVideos": 0, "totalViews": 0, "totalLikes": 0, "totalSubscribers": 0})
    );

    let (status, body) = ctx
        .call(
            Method::GET,
            &format!("/api/v1/dashboard/videos/{}", channel.id()),
            Some(&token),
        )
        .await;
    assert_failure(
        status,
        &body,
        StatusCode::NOT_FOUND,
        "No videos found for this channel",
    );
}

#[tokio::test]
async fn unknown_routes_and_methods_are_enveloped() {
    let ctx = TestApp::new();
    let (status, body) = ctx.call(Method::GET, "/api/v1/nothing-here", None).await;
    assert_failure(
        status,
        &body,
        StatusCode::NOT_FOUND,
        "Route /api/v1/nothing-here not found",
    );

    let (status, body) = ctx.call(Method::PUT, "/api/v1/healthcheck", None).await;
    assert_failure(status, &body, StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
}

fn drop_video_tables(ctx: &TestApp) {
    ctx.state
        .db
        .with_connection(|conn| {
            conn.execute_batch(
                "DROP TABLE playlist_videos;
                 DROP TABLE likes;
                 DROP TABLE comments;
                 DROP TABLE videos;",
            )?;
            Ok(())
        })
        .unwrap();
}

#[tokio::test]
async fn store_failures_are_opaque_unless_debugging() {
    let quiet = TestApp::new();
    drop_video_tables(&quiet);
    let (status, body) = quiet.call(Method::GET, "/api/v1/videos", None).await;
    assert_failure(status, &body, StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");

    let debug = TestApp::with_debug(true);
    drop_video_tables(&debug);
    let (status, body) = debug.call(Method::GET, "/api/v1/videos", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
    assert!(body["stack"].as_str().unwrap().contains("no such table"));
}
