use anyhow::{Context, Result};
use rusqlite::params;

use super::Database;
use crate::{id::ObjectId, models::ChannelStats};

impl Database {
    /// Aggregate counters for a channel. An unknown or empty channel yields
    /// all zeros.
    pub fn channel_stats(&self, channel: ObjectId) -> Result<ChannelStats> {
        self.with_connection(|conn| {
            let (total_videos, total_views): (i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*), COALESCE(SUM(views), 0) FROM videos WHERE owner = ?1",
                    params![channel],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .context("aggregating channel videos")?;

            let total_likes: i64 = conn
                .query_row(
                    r#"
                    SELECT COUNT(*)
                    FROM likes l
                    JOIN videos v ON v.id = l.video
                    WHERE v.owner = ?1
                    "#,
                    params![channel],
                    |row| row.get(0),
                )
                .context("aggregating channel likes")?;

            let total_subscribers: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM subscriptions WHERE channel = ?1",
                    params![channel],
                    |row| row.get(0),
                )
                .context("counting channel subscribers")?;

            Ok(ChannelStats {
                total_videos: total_videos.max(0) as u64,
                total_views,
                total_likes: total_likes.max(0) as u64,
                total_subscribers: total_subscribers.max(0) as u64,
            })
        })
    }
}
