use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use super::Database;
use crate::{
    id::ObjectId,
    models::{NewUser, Principal, UserSummary},
};

impl Database {
    pub fn insert_user(&self, user: &NewUser) -> Result<Principal> {
        let id = ObjectId::new();
        let now = Utc::now();
        self.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO users (
                    id, username, email, full_name, avatar, password_hash,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                "#,
                params![
                    id,
                    user.username.to_lowercase(),
                    user.email.to_lowercase(),
                    user.full_name,
                    user.avatar,
                    user.password_hash,
                    now,
                ],
            )
            .with_context(|| format!("inserting user {}", user.username))?;
            Ok(())
        })?;

        Ok(Principal {
            id,
            username: user.username.to_lowercase(),
            email: user.email.to_lowercase(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
            cover_image: None,
            created_at: now,
        })
    }

    /// Principal lookup for the auth guard. Credentials are never selected.
    pub fn find_principal(&self, id: ObjectId) -> Result<Option<Principal>> {
        self.with_connection(|conn| {
            let principal = conn
                .query_row(
                    r#"
                    SELECT id, username, email, full_name, avatar, cover_image, created_at
                    FROM users
                    WHERE id = ?1
                    "#,
                    [id],
                    row_to_principal,
                )
                .optional()
                .context("looking up principal")?;
            Ok(principal)
        })
    }

    pub fn find_user_summary(&self, id: ObjectId) -> Result<Option<UserSummary>> {
        self.with_connection(|conn| {
            let summary = conn
                .query_row(
                    "SELECT id, username, full_name, avatar FROM users WHERE id = ?1",
                    [id],
                    |row| user_summary_from(row, "id", "username", "full_name", "avatar"),
                )
                .optional()
                .context("looking up user")?;
            Ok(summary)
        })
    }
}

fn row_to_principal(row: &Row<'_>) -> rusqlite::Result<Principal> {
    Ok(Principal {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        full_name: row.get("full_name")?,
        avatar: row.get("avatar")?,
        cover_image: row.get("cover_image")?,
        created_at: row.get("created_at")?,
    })
}

/// Reads a joined user projection out of aliased columns.
pub(super) fn user_summary_from(
    row: &Row<'_>,
    id: &str,
    username: &str,
    full_name: &str,
    avatar: &str,
) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(id)?,
        username: row.get(username)?,
        full_name: row.get(full_name)?,
        avatar: row.get(avatar)?,
    })
}
