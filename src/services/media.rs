//! Media uploads and cover selection

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;

use crate::config::StorageConfig;
use crate::db::repositories::MediaFileRepository;
use crate::models::{MediaFile, MediaRole, NewMediaFile};
use crate::services::form::{round_mb, trimmed_or_none};
use crate::storage::{upload_to_storage, MediaStorage, UploadedFile};

#[derive(Debug, thiserror::Error)]
pub enum MediaServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct MediaService {
    media_repo: Arc<dyn MediaFileRepository>,
    storage: Arc<dyn MediaStorage>,
    config: StorageConfig,
}

impl MediaService {
    pub fn new(
        media_repo: Arc<dyn MediaFileRepository>,
        storage: Arc<dyn MediaStorage>,
        config: StorageConfig,
    ) -> Self {
        Self {
            media_repo,
            storage,
            config,
        }
    }

    /// Reject files the store does not accept, before anything is written
    pub fn check_upload(&self, file: &UploadedFile) -> Result<(), MediaServiceError> {
        if file.data.is_empty() {
            return Err(MediaServiceError::ValidationError(
                "Uploaded file is empty.".to_string(),
            ));
        }
        if file.size() > self.config.max_file_size {
            return Err(MediaServiceError::ValidationError(format!(
                "File is too large (max {} MB).",
                round_mb(self.config.max_file_size)
            )));
        }
        if !self.config.is_type_allowed(file.mime_type()) {
            return Err(MediaServiceError::ValidationError(format!(
                "File type '{}' is not allowed.",
                file.mime_type()
            )));
        }
        Ok(())
    }

    /// Store a file and record it against an entry.
    ///
    /// # Arguments
    /// * `entry_id` - Entry the file belongs to
    /// * `file` - The uploaded file, checked with [`Self::check_upload`]
    /// * `credits` - Optional attribution shown next to the file
    /// * `role` - `COVER` or `ATTACHMENT`
    ///
    /// # Returns
    /// The recorded media row. When the row cannot be written the stored
    /// object is removed again.
    pub async fn attach(
        &self,
        entry_id: i64,
        file: &UploadedFile,
        credits: Option<&str>,
        role: MediaRole,
    ) -> Result<MediaFile, MediaServiceError> {
        self.check_upload(file)?;

        let stored = upload_to_storage(self.storage.as_ref(), &self.config.bucket, file)
            .await
            .context("Failed to store media")?;

        let created = self
            .media_repo
            .create(&NewMediaFile {
                archive_entry_id: entry_id,
                file_url: stored.public_url,
                file_name: file.file_name.clone(),
                file_type: file.mime_type().to_string(),
                file_size_mb: round_mb(file.size()),
                credits: trimmed_or_none(credits),
                role,
            })
            .await;

        let media = match created {
            Ok(media) => media,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&self.config.bucket, &stored.path).await {
                    tracing::warn!(path = %stored.path, error = %cleanup, "Failed to remove orphaned media object");
                }
                return Err(MediaServiceError::InternalError(e.context("Failed to record media")));
            }
        };

        tracing::info!(entry_id, media_id = media.id, role = %role, "Media attached");
        Ok(media)
    }

    /// Object path inside the bucket for a URL this store handed out
    fn stored_path<'a>(&self, file_url: &'a str) -> Option<&'a str> {
        let prefix = self.storage.public_url(&self.config.bucket, "");
        file_url
            .strip_prefix(prefix.as_str())
            .filter(|path| !path.is_empty())
    }

    /// Delete the stored objects behind media rows.
    ///
    /// Rows pointing outside the store are skipped. Failures are logged, not
    /// returned: the rows are already gone when this runs.
    pub async fn remove_stored(&self, media: &[MediaFile]) {
        for item in media {
            let Some(path) = self.stored_path(&item.file_url) else {
                continue;
            };
            match self.storage.delete(&self.config.bucket, path).await {
                Ok(()) => tracing::debug!(media_id = item.id, path, "Media object removed"),
                Err(e) => tracing::warn!(media_id = item.id, path, error = %e, "Failed to remove media object"),
            }
        }
    }

    pub async fn list_for_entry(&self, entry_id: i64) -> Result<Vec<MediaFile>, MediaServiceError> {
        Ok(self
            .media_repo
            .list_by_entry(entry_id)
            .await
            .context("Failed to list media")?)
    }

    /// Cover URL per entry, from all stored cover rows
    pub async fn cover_urls(&self) -> Result<HashMap<i64, String>, MediaServiceError> {
        let covers = self
            .media_repo
            .list_covers()
            .await
            .context("Failed to list cover media")?;
        Ok(select_cover_media(&covers)
            .into_iter()
            .map(|(entry_id, media)| (entry_id, media.file_url.clone()))
            .collect())
    }
}

/// First `COVER` row per entry, by creation time then id
pub fn select_cover_media(media: &[MediaFile]) -> HashMap<i64, &MediaFile> {
    let mut covers: HashMap<i64, &MediaFile> = HashMap::new();
    for item in media.iter().filter(|m| m.role == MediaRole::Cover) {
        covers
            .entry(item.archive_entry_id)
            .and_modify(|current| {
                if (item.created_at, item.id) < (current.created_at, current.id) {
                    *current = item;
                }
            })
            .or_insert(item);
    }
    covers
}

/// Cover media URL, else the entry's external image URL
pub fn display_cover(cover_media_url: Option<&str>, image_url: Option<&str>) -> Option<String> {
    cover_media_url
        .or(image_url)
        .filter(|url| !url.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ArchiveEntryRepository, SqlxArchiveEntryRepository, SqlxMediaFileRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{EntryStatus, EntryType, NewArchiveEntry};
    use crate::storage::LocalStorage;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn media(id: i64, entry: i64, role: MediaRole, minute: i64) -> MediaFile {
        MediaFile {
            id,
            archive_entry_id: entry,
            file_url: format!("http://x/{}", id),
            file_name: format!("{}.png", id),
            file_type: "image/png".into(),
            file_size_mb: 0.1,
            credits: None,
            role,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[test]
    fn test_select_cover_media_keeps_first_cover() {
        let rows = vec![
            media(3, 1, MediaRole::Cover, 5),
            media(1, 1, MediaRole::Attachment, 0),
            media(2, 1, MediaRole::Cover, 1),
            media(5, 2, MediaRole::Cover, 1),
            media(4, 2, MediaRole::Cover, 1),
        ];

        let covers = select_cover_media(&rows);
        assert_eq!(covers.len(), 2);
        assert_eq!(covers[&1].id, 2);
        assert_eq!(covers[&2].id, 4);
    }

    #[test]
    fn test_display_cover_falls_back_to_image_url() {
        assert_eq!(display_cover(Some("a"), Some("b")).as_deref(), Some("a"));
        assert_eq!(display_cover(None, Some("b")).as_deref(), Some("b"));
        assert_eq!(display_cover(None, None), None);
    }

    async fn setup() -> (MediaService, i64, TempDir) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let entry = SqlxArchiveEntryRepository::new(pool.clone())
            .create(&NewArchiveEntry {
                title: "Kiosk".into(),
                description: "Corner kiosk".into(),
                entry_type: EntryType::Space,
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
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            path: dir.path().to_path_buf(),
            max_file_size: 1024,
            ..StorageConfig::default()
        };
        let storage = Arc::new(LocalStorage::new(config.path.clone(), &config.public_base_url));
        let service = MediaService::new(SqlxMediaFileRepository::boxed(pool), storage, config);
        (service, entry.id, dir)
    }

    fn png(len: usize) -> UploadedFile {
        UploadedFile {
            file_name: "front.PNG".into(),
            content_type: Some("image/png".into()),
            data: vec![7; len],
        }
    }

    #[tokio::test]
    async fn test_attach_stores_file_and_row() {
        let (service, entry_id, dir) = setup().await;

        let media = service
            .attach(entry_id, &png(10), Some("  Photo: K. "), MediaRole::Cover)
            .await
            .unwrap();

        assert_eq!(media.file_name, "front.PNG");
        assert_eq!(media.file_type, "image/png");
        assert_eq!(media.credits.as_deref(), Some("Photo: K."));
        assert!(media.file_url.starts_with("http://localhost:4000/media/media_archive/entries/"));
        assert!(media.file_url.ends_with(".PNG"));

        let relative = media
            .file_url
            .trim_start_matches("http://localhost:4000/media/")
            .to_string();
        assert!(dir.path().join(relative).exists());

        let covers = service.cover_urls().await.unwrap();
        assert_eq!(covers.get(&entry_id), Some(&media.file_url));
    }

    #[tokio::test]
    async fn test_attach_rejects_bad_uploads() {
        let (service, entry_id, _dir) = setup().await;

        let too_big = service.attach(entry_id, &png(2048), None, MediaRole::Cover).await;
        assert!(matches!(too_big, Err(MediaServiceError::ValidationError(_))));

        let mut script = png(10);
        script.content_type = Some("application/x-sh".into());
        let wrong_type = service.attach(entry_id, &script, None, MediaRole::Attachment).await;
        assert!(matches!(wrong_type, Err(MediaServiceError::ValidationError(_))));

        assert!(service.list_for_entry(entry_id).await.unwrap().is_empty());
    }

    fn stored_files(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("media_archive").join("entries"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_failed_row_insert_removes_object() {
        let (service, _entry_id, dir) = setup().await;

        // No such entry: the media row violates its foreign key
        let result = service.attach(4242, &png(10), None, MediaRole::Cover).await;
        assert!(matches!(result, Err(MediaServiceError::InternalError(_))));
        assert_eq!(stored_files(&dir), 0);
    }

    #[tokio::test]
    async fn test_remove_stored_deletes_objects() {
        let (service, entry_id, dir) = setup().await;
        let kept = service.attach(entry_id, &png(10), None, MediaRole::Cover).await.unwrap();
        let removed = service.attach(entry_id, &png(10), None, MediaRole::Attachment).await.unwrap();
        let external = MediaFile {
            file_url: "https://elsewhere.example/a.png".into(),
            ..removed.clone()
        };
        assert_eq!(stored_files(&dir), 2);

        service.remove_stored(&[removed, external]).await;
        assert_eq!(stored_files(&dir), 1);

        let relative = kept.file_url.trim_start_matches("http://localhost:4000/media/");
        assert!(dir.path().join(relative).exists());
    }
}
