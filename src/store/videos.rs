use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params, params_from_iter, types::Value};

use super::{Database, users::user_summary_from};
use crate::{
    id::ObjectId,
    models::{NewVideo, Page, UserSummary, Video, VideoPatch, VideoQuery},
};

pub(super) const VIDEO_COLUMNS: &str = "id, video_file, thumbnail, title, description, duration, \
     views, is_published, owner, created_at, updated_at";

/// Same columns, qualified for queries that join `videos v` with other tables.
pub(super) const JOINED_VIDEO_COLUMNS: &str = "v.id AS id, v.video_file AS video_file, \
     v.thumbnail AS thumbnail, v.title AS title, v.description AS description, \
     v.duration AS duration, v.views AS views, v.is_published AS is_published, \
     v.owner AS owner, v.created_at AS created_at, v.updated_at AS updated_at";

pub(super) const MAX_PAGE_SIZE: u32 = 100;

impl Database {
    pub fn insert_video(&self, video: &NewVideo) -> Result<Video> {
        let id = ObjectId::new();
        let now = Utc::now();
        self.with_connection(|conn| {
            let record = conn
                .query_row(
                    &format!(
                        r#"
                        INSERT INTO videos (
                            id, video_file, thumbnail, title, description, duration,
                            views, is_published, owner, created_at, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 1, ?7, ?8, ?8)
                        RETURNING {VIDEO_COLUMNS}
                        "#
                    ),
                    params![
                        id,
                        video.video_file,
                        video.thumbnail,
                        video.title,
                        video.description,
                        video.duration,
                        video.owner,
                        now,
                    ],
                    row_to_video,
                )
                .context("inserting video")?;
            Ok(record)
        })
    }

    pub fn find_video(&self, id: ObjectId) -> Result<Option<Video>> {
        self.with_connection(|conn| {
            let video = conn
                .query_row(
                    &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
                    [id],
                    row_to_video,
                )
                .optional()
                .context("looking up video")?;
            Ok(video)
        })
    }

    /// Video plus its owner's public profile, fetched in one join.
    pub fn find_video_with_owner(&self, id: ObjectId) -> Result<Option<Video<UserSummary>>> {
        self.with_connection(|conn| {
            let video = conn
                .query_row(
                    &format!(
                        r#"
                        SELECT {JOINED_VIDEO_COLUMNS},
                               u.username AS owner_username,
                               u.full_name AS owner_full_name,
                               u.avatar AS owner_avatar
                        FROM videos v
                        JOIN users u ON u.id = v.owner
                        WHERE v.id = ?1
                        "#
                    ),
                    [id],
                    |row| {
                        let owner = user_summary_from(
                            row,
                            "owner",
                            "owner_username",
                            "owner_full_name",
                            "owner_avatar",
                        )?;
                        Ok(row_to_video(row)?.with_owner(owner))
                    },
                )
                .optional()
                .context("looking up video with owner")?;
            Ok(video)
        })
    }

    pub fn list_published_videos(&self, query: &VideoQuery) -> Result<Page<Video>> {
        let page = query.page.max(1);
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);

        let mut filters = vec!["is_published = 1".to_string()];
        let mut args: Vec<Value> = Vec::new();
        if let Some(needle) = query.title_contains.as_deref().filter(|s| !s.is_empty()) {
            args.push(Value::Text(format!("%{}%", escape_like(needle))));
            filters.push(format!("title LIKE ?{} ESCAPE '\\'", args.len()));
        }
        if let Some(owner) = query.owner {
            args.push(Value::Text(owner.to_string()));
            filters.push(format!("owner = ?{}", args.len()));
        }
        let where_clause = filters.join(" AND ");

        let column = query.sort_by.column();
        let direction = query.direction.keyword();
        let offset = i64::from(page - 1) * i64::from(limit);

        self.with_connection(|conn| {
            let total: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM videos WHERE {where_clause}"),
                    params_from_iter(args.iter()),
                    |row| row.get(0),
                )
                .context("counting videos")?;

            let mut stmt = conn.prepare(&format!(
                r#"
                SELECT {VIDEO_COLUMNS}
                FROM videos
                WHERE {where_clause}
                ORDER BY {column} {direction}, id {direction}
                LIMIT {limit} OFFSET {offset}
                "#
            ))?;
            let docs = stmt
                .query_map(params_from_iter(args.iter()), row_to_video)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("listing videos")?;

            Ok(Page::new(docs, total.max(0) as u64, page, limit))
        })
    }

    /// Every video of a channel, published or not, newest first.
    pub fn list_channel_videos(&self, owner: ObjectId) -> Result<Vec<Video>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VIDEO_COLUMNS} FROM videos WHERE owner = ?1 ORDER BY created_at DESC, id DESC"
            ))?;
            let videos = stmt
                .query_map([owner], row_to_video)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("listing channel videos")?;
            Ok(videos)
        })
    }

    /// Applies `patch` only if `owner` still owns the video. `None` means no
    /// row matched.
    pub fn update_video(
        &self,
        id: ObjectId,
        owner: ObjectId,
        patch: &VideoPatch,
    ) -> Result<Option<Video>> {
        let now = Utc::now();
        self.with_connection(|conn| {
            let video = conn
                .query_row(
                    &format!(
                        r#"
                        UPDATE videos SET
                            title = COALESCE(?3, title),
                            description = COALESCE(?4, description),
                            thumbnail = COALESCE(?5, thumbnail),
                            updated_at = ?6
                        WHERE id = ?1 AND owner = ?2
                        RETURNING {VIDEO_COLUMNS}
                        "#
                    ),
                    params![id, owner, patch.title, patch.description, patch.thumbnail, now],
                    row_to_video,
                )
                .optional()
                .context("updating video")?;
            Ok(video)
        })
    }

    pub fn toggle_video_published(&self, id: ObjectId, owner: ObjectId) -> Result<Option<Video>> {
        let now = Utc::now();
        self.with_connection(|conn| {
            let video = conn
                .query_row(
                    &format!(
                        r#"
                        UPDATE videos SET
                            is_published = 1 - is_published,
                            updated_at = ?3
                        WHERE id = ?1 AND owner = ?2
                        RETURNING {VIDEO_COLUMNS}
                        "#
                    ),
                    params![id, owner, now],
                    row_to_video,
                )
                .optional()
                .context("toggling publish status")?;
            Ok(video)
        })
    }

    /// Removes the video; comments, likes and playlist entries cascade.
    pub fn delete_video(&self, id: ObjectId, owner: ObjectId) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM videos WHERE id = ?1 AND owner = ?2",
                    params![id, owner],
                )
                .context("deleting video")?;
            Ok(removed > 0)
        })
    }
}

pub(super) fn row_to_video(row: &Row<'_>) -> rusqlite::Result<Video> {
    Ok(Video {
        id: row.get("id")?,
        video_file: row.get("video_file")?,
        thumbnail: row.get("thumbnail")?,
        title: row.get("title")?,
        description: row.get("description")?,
        duration: row.get("duration")?,
        views: row.get("views")?,
        is_published: row.get::<_, i64>("is_published").map(|value| value != 0)?,
        owner: row.get("owner")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
