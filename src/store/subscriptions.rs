//! Channel subscriptions. Toggling follows the same read-then-conditional
//! write scheme as likes, backed by `UNIQUE (subscriber, channel)`.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

use super::{Database, users::user_summary_from};
use crate::{
    id::ObjectId,
    models::{Subscription, UserSummary},
};

fn subscribed_on(conn: &Connection, subscriber: ObjectId, channel: ObjectId) -> Result<bool> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE subscriber = ?1 AND channel = ?2)",
            params![subscriber, channel],
            |row| row.get(0),
        )
        .context("checking subscription")?;
    Ok(exists)
}

fn set_subscribed_on(
    conn: &Connection,
    subscriber: ObjectId,
    channel: ObjectId,
    subscribed: bool,
) -> Result<bool> {
    let changed = if subscribed {
        conn.execute(
            r#"
            INSERT INTO subscriptions (id, subscriber, channel, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (subscriber, channel) DO NOTHING
            "#,
            params![ObjectId::new(), subscriber, channel, Utc::now()],
        )
        .context("inserting subscription")?
    } else {
        conn.execute(
            "DELETE FROM subscriptions WHERE subscriber = ?1 AND channel = ?2",
            params![subscriber, channel],
        )
        .context("deleting subscription")?
    };
    Ok(changed > 0)
}

impl Database {
    pub fn is_subscribed(&self, subscriber: ObjectId, channel: ObjectId) -> Result<bool> {
        self.with_connection(|conn| subscribed_on(conn, subscriber, channel))
    }

    /// Subscribe-if-absent or unsubscribe-if-present; idempotent.
    pub fn set_subscribed(
        &self,
        subscriber: ObjectId,
        channel: ObjectId,
        subscribed: bool,
    ) -> Result<bool> {
        self.with_connection(|conn| set_subscribed_on(conn, subscriber, channel, subscribed))
    }

    /// Flips the subscription and returns whether the subscriber is now
    /// subscribed.
    pub fn toggle_subscription(&self, subscriber: ObjectId, channel: ObjectId) -> Result<bool> {
        self.with_connection(|conn| {
            let currently = subscribed_on(conn, subscriber, channel)?;
            set_subscribed_on(conn, subscriber, channel, !currently)?;
            subscribed_on(conn, subscriber, channel)
        })
    }

    pub fn list_subscribers(
        &self,
        channel: ObjectId,
    ) -> Result<Vec<Subscription<UserSummary, ObjectId>>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT s.id AS id, s.channel AS channel, s.created_at AS created_at,
                       u.id AS user_id, u.username AS username,
                       u.full_name AS full_name, u.avatar AS avatar
                FROM subscriptions s
                JOIN users u ON u.id = s.subscriber
                WHERE s.channel = ?1
                ORDER BY s.created_at DESC, s.id DESC
                "#,
            )?;
            let rows = stmt
                .query_map([channel], |row| {
                    Ok(Subscription {
                        id: row.get("id")?,
                        subscriber: user_summary_from(row, "user_id", "username", "full_name", "avatar")?,
                        channel: row.get("channel")?,
                        created_at: row.get("created_at")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("listing subscribers")?;
            Ok(rows)
        })
    }

    pub fn list_subscribed_channels(
        &self,
        subscriber: ObjectId,
    ) -> Result<Vec<Subscription<ObjectId, UserSummary>>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT s.id AS id, s.subscriber AS subscriber, s.created_at AS created_at,
                       u.id AS user_id, u.username AS username,
                       u.full_name AS full_name, u.avatar AS avatar
                FROM subscriptions s
                JOIN users u ON u.id = s.channel
                WHERE s.subscriber = ?1
                ORDER BY s.created_at DESC, s.id DESC
                "#,
            )?;
            let rows = stmt
                .query_map([subscriber], |row| {
                    Ok(Subscription {
                        id: row.get("id")?,
                        subscriber: row.get("subscriber")?,
                        channel: user_summary_from(row, "user_id", "username", "full_name", "avatar")?,
                        created_at: row.get("created_at")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("listing subscribed channels")?;
            Ok(rows)
        })
    }
}
