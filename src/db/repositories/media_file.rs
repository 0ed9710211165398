//! Media file repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{MediaFile, MediaRole, NewMediaFile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait MediaFileRepository: Send + Sync {
    async fn create(&self, media: &NewMediaFile) -> Result<MediaFile>;

    /// Media of one entry in upload order
    async fn list_by_entry(&self, entry_id: i64) -> Result<Vec<MediaFile>>;

    /// Every `COVER` row, in upload order
    async fn list_covers(&self) -> Result<Vec<MediaFile>>;
}

pub struct SqlxMediaFileRepository {
    pool: DynDatabasePool,
}

impl SqlxMediaFileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MediaFileRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch(&self, filter: &str, bind: MediaFilter<'_>) -> Result<Vec<MediaFile>> {
        let sql = format!(
            r#"
            SELECT id, archive_entry_id, file_url, file_name, file_type, file_size_mb,
                   credits, role, created_at
            FROM media_files
            WHERE {}
            ORDER BY created_at ASC, id ASC
            "#,
            filter
        );

        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let query = match bind {
                    MediaFilter::Entry(id) => sqlx::query(&sql).bind(id),
                    MediaFilter::Role(role) => sqlx::query(&sql).bind(role),
                };
                query
                    .fetch_all(pool)
                    .await
                    .context("Failed to list media files")?
                    .iter()
                    .map(|row| {
                        media_from_parts(
                            row.get("id"),
                            row.get("archive_entry_id"),
                            row.get("file_url"),
                            row.get("file_name"),
                            row.get("file_type"),
                            row.get("file_size_mb"),
                            row.get("credits"),
                            row.get("role"),
                            row.get("created_at"),
                        )
                    })
                    .collect()
            }
            Backend::Mysql(pool) => {
                let query = match bind {
                    MediaFilter::Entry(id) => sqlx::query(&sql).bind(id),
                    MediaFilter::Role(role) => sqlx::query(&sql).bind(role),
                };
                query
                    .fetch_all(pool)
                    .await
                    .context("Failed to list media files")?
                    .iter()
                    .map(|row| {
                        media_from_parts(
                            row.get("id"),
                            row.get("archive_entry_id"),
                            row.get("file_url"),
                            row.get("file_name"),
                            row.get("file_type"),
                            row.get("file_size_mb"),
                            row.get("credits"),
                            row.get("role"),
                            row.get("created_at"),
                        )
                    })
                    .collect()
            }
        }
    }
}

enum MediaFilter<'a> {
    Entry(i64),
    Role(&'a str),
}

#[allow(clippy::too_many_arguments)]
fn media_from_parts(
    id: i64,
    archive_entry_id: i64,
    file_url: String,
    file_name: String,
    file_type: String,
    file_size_mb: f64,
    credits: Option<String>,
    role: String,
    created_at: chrono::DateTime<Utc>,
) -> Result<MediaFile> {
    let role = MediaRole::from_str(&role)
        .with_context(|| format!("Invalid media role in database: {}", role))?;
    Ok(MediaFile {
        id,
        archive_entry_id,
        file_url,
        file_name,
        file_type,
        file_size_mb,
        credits,
        role,
        created_at,
    })
}

#[async_trait]
impl MediaFileRepository for SqlxMediaFileRepository {
    async fn create(&self, media: &NewMediaFile) -> Result<MediaFile> {
        let sql = r#"
            INSERT INTO media_files
                (archive_entry_id, file_url, file_name, file_type, file_size_mb, credits, role, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(media.archive_entry_id)
                .bind(&media.file_url)
                .bind(&media.file_name)
                .bind(&media.file_type)
                .bind(media.file_size_mb)
                .bind(&media.credits)
                .bind(media.role.to_string())
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create media file")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(media.archive_entry_id)
                .bind(&media.file_url)
                .bind(&media.file_name)
                .bind(&media.file_type)
                .bind(media.file_size_mb)
                .bind(&media.credits)
                .bind(media.role.to_string())
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create media file")?
                .last_insert_id() as i64,
        };

        Ok(MediaFile {
            id,
            archive_entry_id: media.archive_entry_id,
            file_url: media.file_url.clone(),
            file_name: media.file_name.clone(),
            file_type: media.file_type.clone(),
            file_size_mb: media.file_size_mb,
            credits: media.credits.clone(),
            role: media.role,
            created_at: now,
        })
    }

    async fn list_by_entry(&self, entry_id: i64) -> Result<Vec<MediaFile>> {
        self.fetch("archive_entry_id = ?", MediaFilter::Entry(entry_id)).await
    }

    async fn list_covers(&self) -> Result<Vec<MediaFile>> {
        let cover = MediaRole::Cover.to_string();
        self.fetch("role = ?", MediaFilter::Role(&cover)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{ArchiveEntryRepository, SqlxArchiveEntryRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{EntryStatus, EntryType, NewArchiveEntry};

    async fn setup() -> (SqlxMediaFileRepository, SqlxArchiveEntryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (
            SqlxMediaFileRepository::new(pool.clone()),
            SqlxArchiveEntryRepository::new(pool),
        )
    }

    async fn entry(repo: &SqlxArchiveEntryRepository) -> i64 {
        repo.create(&NewArchiveEntry {
            title: "Tram stop".into(),
            description: "Old shelter".into(),
            entry_type: EntryType::Photography,
            keywords: vec![],
            origin_date: None,
            external_links: vec![],
            image_url: None,
            status: EntryStatus::Submitted,
            author_id: None,
            location_id: None,
            created_by: None,
        })
        .await
        .expect("Failed to create entry")
        .id
    }

    fn media(entry_id: i64, name: &str, role: MediaRole) -> NewMediaFile {
        NewMediaFile {
            archive_entry_id: entry_id,
            file_url: format!("http://localhost/media/{}", name),
            file_name: name.to_string(),
            file_type: "image/jpeg".into(),
            file_size_mb: 1.25,
            credits: Some("Photo: K.".into()),
            role,
        }
    }

    #[tokio::test]
    async fn test_list_by_entry_in_upload_order() {
        let (repo, entries) = setup().await;
        let id = entry(&entries).await;

        repo.create(&media(id, "a.jpg", MediaRole::Cover)).await.unwrap();
        repo.create(&media(id, "b.jpg", MediaRole::Attachment)).await.unwrap();

        let listed = repo.list_by_entry(id).await.unwrap();
        let names: Vec<_> = listed.iter().map(|m| m.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
        assert_eq!(listed[0].file_size_mb, 1.25);
        assert_eq!(listed[1].role, MediaRole::Attachment);
    }

    #[tokio::test]
    async fn test_list_covers_skips_attachments() {
        let (repo, entries) = setup().await;
        let first = entry(&entries).await;
        let second = entry(&entries).await;

        repo.create(&media(first, "cover.jpg", MediaRole::Cover)).await.unwrap();
        repo.create(&media(first, "extra.pdf", MediaRole::Attachment)).await.unwrap();
        repo.create(&media(second, "other.jpg", MediaRole::Cover)).await.unwrap();

        let covers = repo.list_covers().await.unwrap();
        assert_eq!(covers.len(), 2);
        assert!(covers.iter().all(|m| m.role == MediaRole::Cover));
    }
}
