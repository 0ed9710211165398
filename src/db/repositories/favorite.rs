//! Favorite repository
//!
//! `(user_id, archive_entry_id)` is unique; `add` relies on the driver's
//! ignore-on-conflict insert to stay idempotent.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{EntrySummary, EntryType, FavoriteWithEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// Insert the pair unless it already exists
    async fn add(&self, user_id: i64, entry_id: i64) -> Result<()>;

    /// Returns whether a row was removed
    async fn remove(&self, user_id: i64, entry_id: i64) -> Result<bool>;

    async fn exists(&self, user_id: i64, entry_id: i64) -> Result<bool>;

    /// A user's favorites with entry summaries, newest first.
    ///
    /// Entries that are not approved are only included when the user
    /// submitted them, or for admins when `include_hidden` is set.
    async fn list_by_user(&self, user_id: i64, include_hidden: bool) -> Result<Vec<FavoriteWithEntry>>;
}

pub struct SqlxFavoriteRepository {
    pool: DynDatabasePool,
}

impl SqlxFavoriteRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FavoriteRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_SQL: &str = r#"
    SELECT f.id, f.created_at, e.id AS entry_id, e.title, e.entry_type, e.image_url
    FROM favorites f
    JOIN archive_entries e ON e.id = f.archive_entry_id
    WHERE f.user_id = ?
      AND (? OR e.status = 'APPROVED' OR e.created_by = f.user_id)
    ORDER BY f.created_at DESC, f.id DESC
"#;

#[async_trait]
impl FavoriteRepository for SqlxFavoriteRepository {
    async fn add(&self, user_id: i64, entry_id: i64) -> Result<()> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO favorites (user_id, archive_entry_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(user_id)
                .bind(entry_id)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to add favorite")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(
                    "INSERT IGNORE INTO favorites (user_id, archive_entry_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(user_id)
                .bind(entry_id)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to add favorite")?;
            }
        }
        Ok(())
    }

    async fn remove(&self, user_id: i64, entry_id: i64) -> Result<bool> {
        let sql = "DELETE FROM favorites WHERE user_id = ? AND archive_entry_id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(entry_id)
                .execute(pool)
                .await
                .context("Failed to remove favorite")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(entry_id)
                .execute(pool)
                .await
                .context("Failed to remove favorite")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists(&self, user_id: i64, entry_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM favorites WHERE user_id = ? AND archive_entry_id = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(entry_id)
                .fetch_one(pool)
                .await
                .context("Failed to check favorite")?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(entry_id)
                .fetch_one(pool)
                .await
                .context("Failed to check favorite")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn list_by_user(&self, user_id: i64, include_hidden: bool) -> Result<Vec<FavoriteWithEntry>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(LIST_SQL)
                .bind(user_id)
                .bind(include_hidden)
                .fetch_all(pool)
                .await
                .context("Failed to list favorites")?
                .iter()
                .map(|row| {
                    favorite_from_parts(
                        row.get("id"),
                        row.get("created_at"),
                        row.get("entry_id"),
                        row.get("title"),
                        row.get("entry_type"),
                        row.get("image_url"),
                    )
                })
                .collect(),
            Backend::Mysql(pool) => sqlx::query(LIST_SQL)
                .bind(user_id)
                .bind(include_hidden)
                .fetch_all(pool)
                .await
                .context("Failed to list favorites")?
                .iter()
                .map(|row| {
                    favorite_from_parts(
                        row.get("id"),
                        row.get("created_at"),
                        row.get("entry_id"),
                        row.get("title"),
                        row.get("entry_type"),
                        row.get("image_url"),
                    )
                })
                .collect(),
        }
    }
}

fn favorite_from_parts(
    id: i64,
    created_at: chrono::DateTime<Utc>,
    entry_id: i64,
    title: String,
    entry_type: String,
    image_url: Option<String>,
) -> Result<FavoriteWithEntry> {
    let entry_type = EntryType::from_str(&entry_type)
        .with_context(|| format!("Invalid entry type in database: {}", entry_type))?;
    Ok(FavoriteWithEntry {
        id,
        created_at,
        entry: EntrySummary { id: entry_id, title, entry_type, image_url },
    })
}
