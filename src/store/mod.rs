//! SQLite persistence for users, videos, comments, likes, playlists and
//! subscriptions.
//!
//! The [`Database`] handle is cheap to share: it only remembers the file path
//! and opens a short-lived connection for every operation, so blocking work
//! on one request never pins a connection another request needs. WAL mode
//! lets readers proceed while a writer holds the lock.
//!
//! Resource-specific queries live in the submodules as further `impl Database`
//! blocks.

mod comments;
mod dashboard;
mod likes;
mod playlists;
mod subscriptions;
mod users;
mod videos;

pub use playlists::PlaylistInsert;

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use anyhow::{Context, Result};
use rusqlite::Connection;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    connections_opened: AtomicUsize,
}

impl Database {
    /// Opens (and if necessary creates) the database file and ensures the
    /// schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating database directory {}", parent.display()))?;
            }
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("enabling WAL mode")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("setting synchronous mode")?;
        ensure_tables(&mut conn)?;

        Ok(Self {
            path: path.to_path_buf(),
            connections_opened: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of connections handed out since start-up. Every store
    /// operation opens exactly one.
    pub fn connections_opened(&self) -> usize {
        self.connections_opened.load(Ordering::Relaxed)
    }

    pub(crate) fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        let mut conn = Connection::open(&self.path)
            .with_context(|| format!("opening database {}", self.path.display()))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        f(&mut conn)
    }
}

/// Creates every table and index in one transaction so a failure leaves the
/// file untouched.
fn ensure_tables(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE COLLATE NOCASE,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            full_name TEXT NOT NULL,
            avatar TEXT,
            cover_image TEXT,
            password_hash TEXT NOT NULL,
            refresh_token TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS videos (
            id TEXT PRIMARY KEY,
            video_file TEXT NOT NULL,
            thumbnail TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            duration REAL NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0,
            is_published INTEGER NOT NULL DEFAULT 1,
            owner TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            video TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
            owner TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS likes (
            id TEXT PRIMARY KEY,
            liked_by TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            video TEXT REFERENCES videos(id) ON DELETE CASCADE,
            comment TEXT REFERENCES comments(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            CHECK ((video IS NULL) <> (comment IS NULL))
        );

        CREATE TABLE IF NOT EXISTS playlists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            owner TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS playlist_videos (
            playlist TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
            video TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
            added_at TEXT NOT NULL,
            PRIMARY KEY (playlist, video)
        );

        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            subscriber TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            channel TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            UNIQUE (subscriber, channel),
            CHECK (subscriber <> channel)
        );

        CREATE INDEX IF NOT EXISTS idx_videos_owner ON videos(owner);
        CREATE INDEX IF NOT EXISTS idx_videos_published ON videos(is_published, created_at);
        CREATE INDEX IF NOT EXISTS idx_comments_video ON comments(video, created_at);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_likes_actor_video
            ON likes(liked_by, video) WHERE video IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_likes_actor_comment
            ON likes(liked_by, comment) WHERE comment IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_likes_video ON likes(video);
        CREATE INDEX IF NOT EXISTS idx_likes_comment ON likes(comment);
        CREATE INDEX IF NOT EXISTS idx_playlists_owner ON playlists(owner);
        CREATE INDEX IF NOT EXISTS idx_subscriptions_channel ON subscriptions(channel);
        "#,
    )?;

    tx.commit()?;
    Ok(())
}
