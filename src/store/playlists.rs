use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{
    Database,
    videos::{JOINED_VIDEO_COLUMNS, row_to_video},
};
use crate::{
    id::ObjectId,
    models::{Playlist, Video},
};

const PLAYLIST_COLUMNS: &str = "id, name, description, owner, created_at, updated_at";

/// Outcome of adding a video to a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistInsert {
    Added,
    AlreadyPresent,
}

fn row_to_playlist(row: &Row<'_>) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        owner: row.get("owner")?,
        videos: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn playlist_video_ids(conn: &Connection, playlist: ObjectId) -> Result<Vec<ObjectId>> {
    let mut stmt = conn.prepare(
        "SELECT video FROM playlist_videos WHERE playlist = ?1 ORDER BY added_at ASC, rowid ASC",
    )?;
    let ids = stmt
        .query_map([playlist], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("listing playlist entries")?;
    Ok(ids)
}

fn playlist_videos(conn: &Connection, playlist: ObjectId) -> Result<Vec<Video>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {JOINED_VIDEO_COLUMNS}
        FROM playlist_videos p
        JOIN videos v ON v.id = p.video
        WHERE p.playlist = ?1
        ORDER BY p.added_at ASC, p.rowid ASC
        "#
    ))?;
    let videos = stmt
        .query_map([playlist], row_to_video)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("loading playlist videos")?;
    Ok(videos)
}

fn find_playlist_on(conn: &Connection, id: ObjectId) -> Result<Option<Playlist>> {
    let playlist = conn
        .query_row(
            &format!("SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE id = ?1"),
            [id],
            row_to_playlist,
        )
        .optional()
        .context("looking up playlist")?;
    match playlist {
        Some(mut playlist) => {
            playlist.videos = playlist_video_ids(conn, id)?;
            Ok(Some(playlist))
        }
        None => Ok(None),
    }
}

fn with_videos(conn: &Connection, playlist: Playlist) -> Result<Playlist<Video>> {
    let videos = playlist_videos(conn, playlist.id)?;
    Ok(Playlist {
        id: playlist.id,
        name: playlist.name,
        description: playlist.description,
        owner: playlist.owner,
        videos,
        created_at: playlist.created_at,
        updated_at: playlist.updated_at,
    })
}

fn touch(conn: &Connection, playlist: ObjectId) -> Result<()> {
    conn.execute(
        "UPDATE playlists SET updated_at = ?2 WHERE id = ?1",
        params![playlist, Utc::now()],
    )
    .context("touching playlist")?;
    Ok(())
}

impl Database {
    pub fn insert_playlist(&self, owner: ObjectId, name: &str, description: &str) -> Result<Playlist> {
        let id = ObjectId::new();
        let now = Utc::now();
        self.with_connection(|conn| {
            let playlist = conn
                .query_row(
                    &format!(
                        r#"
                        INSERT INTO playlists (id, name, description, owner, created_at, updated_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                        RETURNING {PLAYLIST_COLUMNS}
                        "#
                    ),
                    params![id, name, description, owner, now],
                    row_to_playlist,
                )
                .context("inserting playlist")?;
            Ok(playlist)
        })
    }

    /// Playlist with its video ids in insertion order.
    pub fn find_playlist(&self, id: ObjectId) -> Result<Option<Playlist>> {
        self.with_connection(|conn| find_playlist_on(conn, id))
    }

    /// Playlist with the full video records joined in.
    pub fn find_playlist_with_videos(&self, id: ObjectId) -> Result<Option<Playlist<Video>>> {
        self.with_connection(|conn| match find_playlist_on(conn, id)? {
            Some(playlist) => with_videos(conn, playlist).map(Some),
            None => Ok(None),
        })
    }

    pub fn list_user_playlists(&self, owner: ObjectId) -> Result<Vec<Playlist>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE owner = ?1 ORDER BY created_at DESC, id DESC"
            ))?;
            let mut playlists = stmt
                .query_map([owner], row_to_playlist)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("listing playlists")?;
            for playlist in &mut playlists {
                playlist.videos = playlist_video_ids(conn, playlist.id)?;
            }
            Ok(playlists)
        })
    }

    pub fn update_playlist(
        &self,
        id: ObjectId,
        owner: ObjectId,
        name: &str,
        description: &str,
    ) -> Result<Option<Playlist<Video>>> {
        let now = Utc::now();
        self.with_connection(|conn| {
            let updated = conn
                .query_row(
                    &format!(
                        r#"
                        UPDATE playlists SET name = ?3, description = ?4, updated_at = ?5
                        WHERE id = ?1 AND owner = ?2
                        RETURNING {PLAYLIST_COLUMNS}
                        "#
                    ),
                    params![id, owner, name, description, now],
                    row_to_playlist,
                )
                .optional()
                .context("updating playlist")?;
            match updated {
                Some(playlist) => with_videos(conn, playlist).map(Some),
                None => Ok(None),
            }
        })
    }

    /// Deletes the playlist if `owner` owns it and returns it as it was.
    pub fn delete_playlist(&self, id: ObjectId, owner: ObjectId) -> Result<Option<Playlist>> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let existing = find_playlist_on(&tx, id)?.filter(|playlist| playlist.owner == owner);
            if existing.is_some() {
                tx.execute(
                    "DELETE FROM playlists WHERE id = ?1 AND owner = ?2",
                    params![id, owner],
                )
                .context("deleting playlist")?;
            }
            tx.commit()?;
            Ok(existing)
        })
    }

    pub fn add_video_to_playlist(&self, playlist: ObjectId, video: ObjectId) -> Result<PlaylistInsert> {
        self.with_connection(|conn| {
            let inserted = conn
                .execute(
                    r#"
                    INSERT INTO playlist_videos (playlist, video, added_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT DO NOTHING
                    "#,
                    params![playlist, video, Utc::now()],
                )
                .context("adding video to playlist")?;
            if inserted == 0 {
                return Ok(PlaylistInsert::AlreadyPresent);
            }
            touch(conn, playlist)?;
            Ok(PlaylistInsert::Added)
        })
    }

    /// Returns `false` when the video was not in the playlist.
    pub fn remove_video_from_playlist(&self, playlist: ObjectId, video: ObjectId) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM playlist_videos WHERE playlist = ?1 AND video = ?2",
                    params![playlist, video],
                )
                .context("removing video from playlist")?;
            if removed > 0 {
                touch(conn, playlist)?;
            }
            Ok(removed > 0)
        })
    }
}
