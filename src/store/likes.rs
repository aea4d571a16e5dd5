//! Likes on videos and comments.
//!
//! A toggle reads the actor's current state and then applies the opposite
//! through a conditional write (`INSERT .. ON CONFLICT DO NOTHING` or a keyed
//! `DELETE`). The partial unique indexes on `(liked_by, video)` and
//! `(liked_by, comment)` make the insert idempotent, so two identical requests
//! racing through the read step leave exactly one row behind instead of two.
//!
//! Like counts are always computed from the `likes` table; no per-video or
//! per-comment list is stored.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

use super::{
    Database,
    videos::{JOINED_VIDEO_COLUMNS, row_to_video},
};
use crate::{
    id::ObjectId,
    models::{LikeStatus, LikeTarget, Video},
};

fn target_column(target: LikeTarget) -> (&'static str, ObjectId) {
    match target {
        LikeTarget::Video(id) => ("video", id),
        LikeTarget::Comment(id) => ("comment", id),
    }
}

fn like_exists_on(conn: &Connection, actor: ObjectId, target: LikeTarget) -> Result<bool> {
    let (column, id) = target_column(target);
    let exists: bool = conn
        .query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM likes WHERE liked_by = ?1 AND {column} = ?2)"),
            params![actor, id],
            |row| row.get(0),
        )
        .context("checking like")?;
    Ok(exists)
}

fn set_like_on(conn: &Connection, actor: ObjectId, target: LikeTarget, liked: bool) -> Result<bool> {
    let (column, id) = target_column(target);
    let changed = if liked {
        let (video, comment) = match target {
            LikeTarget::Video(id) => (Some(id), None),
            LikeTarget::Comment(id) => (None, Some(id)),
        };
        conn.execute(
            r#"
            INSERT INTO likes (id, liked_by, video, comment, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT DO NOTHING
            "#,
            params![ObjectId::new(), actor, video, comment, Utc::now()],
        )
        .context("inserting like")?
    } else {
        conn.execute(
            &format!("DELETE FROM likes WHERE liked_by = ?1 AND {column} = ?2"),
            params![actor, id],
        )
        .context("deleting like")?
    };
    Ok(changed > 0)
}

fn count_likes_on(conn: &Connection, target: LikeTarget) -> Result<u64> {
    let (column, id) = target_column(target);
    let count: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM likes WHERE {column} = ?1"),
            [id],
            |row| row.get(0),
        )
        .context("counting likes")?;
    Ok(count.max(0) as u64)
}

impl Database {
    pub fn like_exists(&self, actor: ObjectId, target: LikeTarget) -> Result<bool> {
        self.with_connection(|conn| like_exists_on(conn, actor, target))
    }

    /// Insert-if-absent (`liked == true`) or delete-if-present. Returns
    /// whether a row actually changed; repeating the call is harmless.
    pub fn set_like(&self, actor: ObjectId, target: LikeTarget, liked: bool) -> Result<bool> {
        self.with_connection(|conn| set_like_on(conn, actor, target, liked))
    }

    pub fn count_likes(&self, target: LikeTarget) -> Result<u64> {
        self.with_connection(|conn| count_likes_on(conn, target))
    }

    pub fn toggle_like(&self, actor: ObjectId, target: LikeTarget) -> Result<LikeStatus> {
        self.with_connection(|conn| {
            let currently_liked = like_exists_on(conn, actor, target)?;
            set_like_on(conn, actor, target, !currently_liked)?;
            Ok(LikeStatus {
                is_liked: like_exists_on(conn, actor, target)?,
                likes_count: count_likes_on(conn, target)?,
            })
        })
    }

    /// Videos the actor liked, most recent like first.
    pub fn liked_videos(&self, actor: ObjectId) -> Result<Vec<Video>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                r#"
                SELECT {JOINED_VIDEO_COLUMNS}
                FROM likes l
                JOIN videos v ON v.id = l.video
                WHERE l.liked_by = ?1
                ORDER BY l.created_at DESC, l.id DESC
                "#
            ))?;
            let videos = stmt
                .query_map([actor], row_to_video)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("listing liked videos")?;
            Ok(videos)
        })
    }
}
