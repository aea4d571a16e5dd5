use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use super::{Database, videos::MAX_PAGE_SIZE};
use crate::{
    id::ObjectId,
    models::{Comment, CommentPage},
};

const COMMENT_COLUMNS: &str = "id, content, video, owner, created_at, updated_at";

impl Database {
    /// Comments on a video, newest first.
    pub fn list_comments(&self, video: ObjectId, page: u32, limit: u32) -> Result<CommentPage> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let offset = i64::from(page - 1) * i64::from(limit);

        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                r#"
                SELECT {COMMENT_COLUMNS}
                FROM comments
                WHERE video = ?1
                ORDER BY created_at DESC, id DESC
                LIMIT ?2 OFFSET ?3
                "#
            ))?;
            let comments = stmt
                .query_map(params![video, i64::from(limit), offset], row_to_comment)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("listing comments")?;

            let total: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM comments WHERE video = ?1",
                    [video],
                    |row| row.get(0),
                )
                .context("counting comments")?;

            Ok(CommentPage {
                comments,
                total_comments: total.max(0) as u64,
            })
        })
    }

    pub fn insert_comment(&self, video: ObjectId, owner: ObjectId, content: &str) -> Result<Comment> {
        let id = ObjectId::new();
        let now = Utc::now();
        self.with_connection(|conn| {
            let comment = conn
                .query_row(
                    &format!(
                        r#"
                        INSERT INTO comments (id, content, video, owner, created_at, updated_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                        RETURNING {COMMENT_COLUMNS}
                        "#
                    ),
                    params![id, content, video, owner, now],
                    row_to_comment,
                )
                .context("inserting comment")?;
            Ok(comment)
        })
    }

    pub fn find_comment(&self, id: ObjectId) -> Result<Option<Comment>> {
        self.with_connection(|conn| {
            let comment = conn
                .query_row(
                    &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                    [id],
                    row_to_comment,
                )
                .optional()
                .context("looking up comment")?;
            Ok(comment)
        })
    }

    pub fn update_comment(
        &self,
        id: ObjectId,
        owner: ObjectId,
        content: &str,
    ) -> Result<Option<Comment>> {
        let now = Utc::now();
        self.with_connection(|conn| {
            let comment = conn
                .query_row(
                    &format!(
                        r#"
                        UPDATE comments SET content = ?3, updated_at = ?4
                        WHERE id = ?1 AND owner = ?2
                        RETURNING {COMMENT_COLUMNS}
                        "#
                    ),
                    params![id, owner, content, now],
                    row_to_comment,
                )
                .optional()
                .context("updating comment")?;
            Ok(comment)
        })
    }

    /// Deletes and returns the comment if `owner` wrote it.
    pub fn delete_comment(&self, id: ObjectId, owner: ObjectId) -> Result<Option<Comment>> {
        self.with_connection(|conn| {
            let comment = conn
                .query_row(
                    &format!(
                        "DELETE FROM comments WHERE id = ?1 AND owner = ?2 RETURNING {COMMENT_COLUMNS}"
                    ),
                    params![id, owner],
                    row_to_comment,
                )
                .optional()
                .context("deleting comment")?;
            Ok(comment)
        })
    }
}

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get("id")?,
        content: row.get("content")?,
        video: row.get("video")?,
        owner: row.get("owner")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
