//! Record types exchanged between the store and the HTTP layer.
//!
//! Each resource is an explicit struct. Joined views ("populated" owners,
//! playlist videos) reuse the same struct with a different type parameter so
//! the serialized shape stays identical apart from the joined field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// The authenticated actor. Built only by the store's principal lookup and
/// never written back; the password hash and refresh token are not selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(rename = "_id")]
    pub(crate) id: ObjectId,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) avatar: Option<String>,
    pub(crate) cover_image: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl Principal {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub fn cover_image(&self) -> Option<&str> {
        self.cover_image.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Public projection of a user used wherever an owner, subscriber or channel
/// is joined into another record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video<Owner = ObjectId> {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner: Owner,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<Owner> Video<Owner> {
    pub fn with_owner<Other>(self, owner: Other) -> Video<Other> {
        Video {
            id: self.id,
            video_file: self.video_file,
            thumbnail: self.thumbnail,
            title: self.title,
            description: self.description,
            duration: self.duration,
            views: self.views,
            is_published: self.is_published,
            owner,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub owner: ObjectId,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

impl VideoPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.thumbnail.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoSortField {
    #[default]
    CreatedAt,
    Views,
    Duration,
    Title,
}

impl VideoSortField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "createdAt" => Some(Self::CreatedAt),
            "views" => Some(Self::Views),
            "duration" => Some(Self::Duration),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Views => "views",
            Self::Duration => "duration",
            Self::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Filter and paging for the public video listing. Only published videos are
/// ever returned.
#[derive(Debug, Clone)]
pub struct VideoQuery {
    pub page: u32,
    pub limit: u32,
    pub title_contains: Option<String>,
    pub owner: Option<ObjectId>,
    pub sort_by: VideoSortField,
    pub direction: SortDirection,
}

impl Default for VideoQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            title_contains: None,
            owner: None,
            sort_by: VideoSortField::default(),
            direction: SortDirection::default(),
        }
    }
}

/// Paginated result, shaped like the listing clients already consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total_docs: u64,
    pub limit: u32,
    pub page: u32,
    pub total_pages: u64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total_docs: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total_docs.div_ceil(u64::from(limit))
        };
        let has_prev_page = page > 1;
        let has_next_page = u64::from(page) < total_pages;
        Self {
            docs,
            total_docs,
            limit,
            page,
            total_pages,
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| page - 1),
            next_page: has_next_page.then(|| page + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub content: String,
    pub video: ObjectId,
    pub owner: ObjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub total_comments: u64,
}

/// What a like toggle is keyed on besides the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Video(ObjectId),
    Comment(ObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub is_liked: bool,
    pub likes_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist<Entry = ObjectId> {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    pub owner: ObjectId,
    pub videos: Vec<Entry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription<Subscriber = ObjectId, Channel = ObjectId> {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub subscriber: Subscriber,
    pub channel: Channel,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_videos: u64,
    pub total_views: i64,
    pub total_likes: u64,
    pub total_subscribers: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_math_matches_listing_contract() {
        let page = Page::new(vec![1, 2, 3], 23, 2, 10);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_prev_page);
        assert!(page.has_next_page);
        assert_eq!(page.prev_page, Some(1));
        assert_eq!(page.next_page, Some(3));

        let empty: Page<u8> = Page::new(Vec::new(), 0, 1, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_prev_page);
        assert!(!empty.has_next_page);
        assert_eq!(empty.next_page, None);
    }

    #[test]
    fn sort_field_only_accepts_known_columns() {
        assert_eq!(VideoSortField::parse("views"), Some(VideoSortField::Views));
        assert_eq!(VideoSortField::parse("createdAt"), Some(VideoSortField::CreatedAt));
        assert_eq!(VideoSortField::parse("owner; DROP TABLE videos"), None);
    }

    #[test]
    fn principal_serializes_without_credentials() {
        let principal = Principal {
            id: ObjectId::new(),
            username: "ada".into(),
            email: "ada@example.test".into(),
            full_name: "Ada Lovelace".into(),
            avatar: None,
            cover_image: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&principal).unwrap();
        assert!(value.get("_id").is_some());
        assert_eq!(value["fullName"], "Ada Lovelace");
        assert!(value.get("password").is_none());
        assert!(value.get("refreshToken").is_none());
    }
}
