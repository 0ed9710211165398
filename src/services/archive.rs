//! Archive entry service
//!
//! Submission, moderation and visibility of archive entries:
//! - anyone may submit (anonymously without media) and read approved entries
//! - creators may read and resubmit their own entries
//! - admins may read, edit, moderate and delete everything
//!
//! The joined approved listing is cached and dropped on every write.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::ArchiveEntryRepository;
use crate::models::{
    ArchiveEntry, EntryListing, EntryStatus, EntryType, MediaFile, MediaRole, NewArchiveEntry,
    User,
};
use crate::services::entities::{AuthorChoice, EntityError, EntityService, LocationChoice};
use crate::services::filter::ArchiveFilter;
use crate::services::form::{parse_comma_list, trimmed_or_none};
use crate::services::media::{display_cover, MediaService, MediaServiceError};
use crate::storage::UploadedFile;
use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use std::sync::Arc;

const CACHE_KEY_APPROVED: &str = "entries:approved";
const CACHE_PATTERN_ENTRIES: &str = "entries:*";

pub const MSG_REQUIRED_FIELDS: &str = "Please fill out title, description and type";
pub const MSG_LOGIN_FOR_MEDIA: &str = "Please log in to upload media.";
pub const MSG_FILE_OR_URL: &str = "Please choose either a file upload or an image URL, not both.";
pub const MSG_MISSING_ENTRY_ID: &str = "Missing entryId";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveServiceError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The entry row was written but its cover could not be stored
    #[error("Entry {entry_id} saved without cover: {reason}")]
    CoverUploadFailed { entry_id: i64, reason: String },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<EntityError> for ArchiveServiceError {
    fn from(err: EntityError) -> Self {
        match err {
            EntityError::InternalError(e) => ArchiveServiceError::InternalError(e),
            other => ArchiveServiceError::ValidationError(other.to_string()),
        }
    }
}

impl From<MediaServiceError> for ArchiveServiceError {
    fn from(err: MediaServiceError) -> Self {
        match err {
            MediaServiceError::ValidationError(msg) => ArchiveServiceError::ValidationError(msg),
            MediaServiceError::InternalError(e) => ArchiveServiceError::InternalError(e),
        }
    }
}

/// Accept a list either as a JSON array or as comma-separated text
fn list_field<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListField {
        Text(String),
        Items(Vec<String>),
    }

    Ok(match Option::<ListField>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(ListField::Text(raw)) => parse_comma_list(&raw),
        Some(ListField::Items(items)) => items
            .iter()
            .filter_map(|item| trimmed_or_none(Some(item.as_str())))
            .collect(),
    })
}

/// Entry form as submitted by the client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryInput {
    /// Target of an admin edit
    #[serde(default, alias = "entryId")]
    pub entry_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type", alias = "entry_type")]
    pub entry_type: String,
    #[serde(default, deserialize_with = "list_field")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub origin_date: Option<String>,
    #[serde(default, deserialize_with = "list_field")]
    pub external_links: Vec<String>,
    /// External cover URL; mutually exclusive with an uploaded file
    #[serde(default)]
    pub image_url: Option<String>,
    /// Present when the author section is shown
    #[serde(default)]
    pub author: Option<AuthorChoice>,
    /// Present when the location section is shown
    #[serde(default)]
    pub location: Option<LocationChoice>,
    /// Admin edits only
    #[serde(default)]
    pub status: Option<EntryStatus>,
}

/// Owner edit of a declined or pending submission
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResubmitInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type", alias = "entry_type")]
    pub entry_type: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Cover file sent alongside an entry form
#[derive(Debug, Clone)]
pub struct CoverUpload {
    pub file: UploadedFile,
    pub credits: Option<String>,
}

/// Entry detail page
#[derive(Debug, Clone, Serialize)]
pub struct EntryDetail {
    #[serde(flatten)]
    pub listing: EntryListing,
    pub media: Vec<MediaFile>,
}

struct RequiredFields {
    title: String,
    description: String,
    entry_type: EntryType,
}

fn required_fields(
    title: &str,
    description: &str,
    entry_type: &str,
) -> Result<RequiredFields, ArchiveServiceError> {
    let (title, description, entry_type) = (title.trim(), description.trim(), entry_type.trim());
    if title.is_empty() || description.is_empty() || entry_type.is_empty() {
        return Err(ArchiveServiceError::ValidationError(MSG_REQUIRED_FIELDS.to_string()));
    }

    let entry_type = EntryType::from_str(entry_type).map_err(|_| {
        ArchiveServiceError::ValidationError(format!(
            "Unknown type '{}'. Use Space, Artifact or Photography.",
            entry_type
        ))
    })?;

    Ok(RequiredFields {
        title: title.to_string(),
        description: description.to_string(),
        entry_type,
    })
}

pub struct ArchiveService {
    repo: Arc<dyn ArchiveEntryRepository>,
    entities: Arc<EntityService>,
    media: Arc<MediaService>,
    cache: Arc<MemoryCache>,
}

impl ArchiveService {
    pub fn new(
        repo: Arc<dyn ArchiveEntryRepository>,
        entities: Arc<EntityService>,
        media: Arc<MediaService>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            entities,
            media,
            cache,
        }
    }

    /// Checks shared by create and edit. Nothing is written before these pass.
    fn validate_cover(
        &self,
        user: Option<&User>,
        image_url: Option<&str>,
        cover: Option<&CoverUpload>,
    ) -> Result<(), ArchiveServiceError> {
        let Some(cover) = cover else {
            return Ok(());
        };
        if trimmed_or_none(image_url).is_some() {
            return Err(ArchiveServiceError::ValidationError(MSG_FILE_OR_URL.to_string()));
        }
        if user.is_none() {
            return Err(ArchiveServiceError::ValidationError(MSG_LOGIN_FOR_MEDIA.to_string()));
        }
        self.media.check_upload(&cover.file)?;
        Ok(())
    }

    async fn resolve_relations(
        &self,
        input: &EntryInput,
    ) -> Result<(Option<i64>, Option<i64>), ArchiveServiceError> {
        let author_id = match &input.author {
            Some(choice) => self.entities.ensure_author_id(choice).await?,
            None => None,
        };
        let location_id = match &input.location {
            Some(choice) => self.entities.ensure_location_id(choice).await?,
            None => None,
        };
        Ok((author_id, location_id))
    }

    /// Upload a cover after the entry row exists.
    ///
    /// The entry is not rolled back when this fails; the caller gets
    /// `CoverUploadFailed` carrying the entry id instead.
    async fn attach_cover(
        &self,
        entry_id: i64,
        cover: Option<&CoverUpload>,
    ) -> Result<(), ArchiveServiceError> {
        let Some(cover) = cover else {
            return Ok(());
        };
        self.media
            .attach(entry_id, &cover.file, cover.credits.as_deref(), MediaRole::Cover)
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::warn!(entry_id, error = %e, "Cover upload failed, entry kept without media");
                let reason = match e {
                    MediaServiceError::ValidationError(msg) => msg,
                    MediaServiceError::InternalError(_) => "the file could not be stored".to_string(),
                };
                ArchiveServiceError::CoverUploadFailed { entry_id, reason }
            })
    }

    /// Submit a new entry. It always starts as `SUBMITTED`.
    ///
    /// # Arguments
    /// * `user` - The submitter, `None` for anonymous submissions
    /// * `input` - The entry form
    /// * `cover` - Optional cover file; needs a logged-in user
    ///
    /// # Returns
    /// The stored entry. Validation errors are returned before any write.
    /// A failed cover upload after the insert yields `CoverUploadFailed`.
    pub async fn create_entry(
        &self,
        user: Option<&User>,
        input: EntryInput,
        cover: Option<CoverUpload>,
    ) -> Result<ArchiveEntry, ArchiveServiceError> {
        let fields = required_fields(&input.title, &input.description, &input.entry_type)?;
        self.validate_cover(user, input.image_url.as_deref(), cover.as_ref())?;

        let (author_id, location_id) = self.resolve_relations(&input).await?;

        let entry = self
            .repo
            .create(&NewArchiveEntry {
                title: fields.title,
                description: fields.description,
                entry_type: fields.entry_type,
                keywords: input.keywords,
                origin_date: trimmed_or_none(input.origin_date.as_deref()),
                external_links: input.external_links,
                image_url: trimmed_or_none(input.image_url.as_deref()),
                status: EntryStatus::Submitted,
                author_id,
                location_id,
                created_by: user.map(|u| u.id),
            })
            .await
            .context("Failed to create entry")?;

        tracing::info!(
            entry_id = entry.id,
            anonymous = user.is_none(),
            entry_type = %entry.entry_type,
            "Entry submitted"
        );

        let attached = self.attach_cover(entry.id, cover.as_ref()).await;
        self.invalidate_cache().await;
        attached?;
        Ok(entry)
    }

    /// Admin edit of any entry, optionally changing its status
    pub async fn update_entry(
        &self,
        user: &User,
        input: EntryInput,
        cover: Option<CoverUpload>,
    ) -> Result<ArchiveEntry, ArchiveServiceError> {
        let id = input
            .entry_id
            .ok_or_else(|| ArchiveServiceError::ValidationError(MSG_MISSING_ENTRY_ID.to_string()))?;
        let fields = required_fields(&input.title, &input.description, &input.entry_type)?;
        self.validate_cover(Some(user), input.image_url.as_deref(), cover.as_ref())?;

        let existing = self.get_entry(id).await?;
        let (author_id, location_id) = self.resolve_relations(&input).await?;

        let updated = self
            .repo
            .update(
                id,
                &NewArchiveEntry {
                    title: fields.title,
                    description: fields.description,
                    entry_type: fields.entry_type,
                    keywords: input.keywords,
                    origin_date: trimmed_or_none(input.origin_date.as_deref()),
                    external_links: input.external_links,
                    image_url: trimmed_or_none(input.image_url.as_deref()),
                    status: input.status.unwrap_or(existing.status),
                    author_id,
                    location_id,
                    created_by: existing.created_by,
                },
            )
            .await
            .context("Failed to update entry")?
            .ok_or_else(|| ArchiveServiceError::NotFound(id.to_string()))?;

        tracing::info!(entry_id = id, admin_id = user.id, status = %updated.status, "Entry edited");

        let attached = self.attach_cover(id, cover.as_ref()).await;
        self.invalidate_cache().await;
        attached?;
        Ok(updated)
    }

    /// Owner edit; sends the entry back to the moderation queue
    pub async fn resubmit(
        &self,
        user: &User,
        id: i64,
        input: ResubmitInput,
    ) -> Result<ArchiveEntry, ArchiveServiceError> {
        let fields = required_fields(&input.title, &input.description, &input.entry_type)?;

        let existing = self.get_entry(id).await?;
        if existing.created_by != Some(user.id) {
            return Err(ArchiveServiceError::Forbidden(
                "Only the submitter can resubmit this entry".to_string(),
            ));
        }

        let updated = self
            .repo
            .update(
                id,
                &NewArchiveEntry {
                    title: fields.title,
                    description: fields.description,
                    entry_type: fields.entry_type,
                    keywords: existing.keywords,
                    origin_date: existing.origin_date,
                    external_links: existing.external_links,
                    image_url: trimmed_or_none(input.image_url.as_deref()),
                    status: EntryStatus::Submitted,
                    author_id: existing.author_id,
                    location_id: existing.location_id,
                    created_by: existing.created_by,
                },
            )
            .await
            .context("Failed to resubmit entry")?
            .ok_or_else(|| ArchiveServiceError::NotFound(id.to_string()))?;

        tracing::info!(entry_id = id, user_id = user.id, "Entry resubmitted");
        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Moderation decision
    pub async fn set_status(&self, id: i64, status: EntryStatus) -> Result<(), ArchiveServiceError> {
        let found = self
            .repo
            .set_status(id, status)
            .await
            .context("Failed to set entry status")?;
        if !found {
            return Err(ArchiveServiceError::NotFound(id.to_string()));
        }

        tracing::info!(entry_id = id, status = %status, "Entry moderated");
        self.invalidate_cache().await;
        Ok(())
    }

    /// Delete an entry together with its media rows and stored files
    pub async fn delete(&self, id: i64) -> Result<(), ArchiveServiceError> {
        let media = self.media.list_for_entry(id).await?;
        let found = self.repo.delete(id).await.context("Failed to delete entry")?;
        if !found {
            return Err(ArchiveServiceError::NotFound(id.to_string()));
        }
        self.media.remove_stored(&media).await;

        tracing::info!(entry_id = id, media = media.len(), "Entry deleted");
        self.invalidate_cache().await;
        Ok(())
    }

    /// Entry with relations and media, as far as `viewer` may see it.
    ///
    /// Non-approved entries are reported as missing to everyone but their
    /// creator and admins.
    pub async fn get_visible(
        &self,
        id: i64,
        viewer: Option<&User>,
    ) -> Result<EntryDetail, ArchiveServiceError> {
        let mut listing = self
            .repo
            .get_listing(id)
            .await
            .context("Failed to get entry")?
            .ok_or_else(|| ArchiveServiceError::NotFound(id.to_string()))?;

        let visible = listing.entry.is_approved()
            || viewer.is_some_and(|u| u.can_manage(listing.entry.created_by));
        if !visible {
            return Err(ArchiveServiceError::NotFound(id.to_string()));
        }

        let media = self.media.list_for_entry(id).await?;
        let cover = media
            .iter()
            .filter(|m| m.role == MediaRole::Cover)
            .min_by_key(|m| (m.created_at, m.id))
            .map(|m| m.file_url.as_str());
        listing.cover_url = display_cover(cover, listing.entry.image_url.as_deref());

        Ok(EntryDetail { listing, media })
    }

    /// Approved entries with covers, filtered and sorted
    pub async fn list_approved(
        &self,
        filter: &ArchiveFilter,
    ) -> Result<Vec<EntryListing>, ArchiveServiceError> {
        Ok(filter.apply(self.approved_listings().await?))
    }

    /// The cached, unfiltered approved listing
    pub async fn approved_listings(&self) -> Result<Vec<EntryListing>, ArchiveServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<EntryListing>>(CACHE_KEY_APPROVED).await {
            return Ok(cached);
        }

        let listings = self.list_by_status(EntryStatus::Approved).await?;
        let _ = self
            .cache
            .set(CACHE_KEY_APPROVED, &listings, self.cache.default_ttl())
            .await;
        Ok(listings)
    }

    /// Moderation queue (or any status), newest first
    pub async fn list_by_status(
        &self,
        status: EntryStatus,
    ) -> Result<Vec<EntryListing>, ArchiveServiceError> {
        let mut listings = self
            .repo
            .list_listings(status)
            .await
            .context("Failed to list entries")?;
        let covers = self.media.cover_urls().await?;
        for listing in &mut listings {
            listing.cover_url = display_cover(
                covers.get(&listing.entry.id).map(String::as_str),
                listing.entry.image_url.as_deref(),
            );
        }
        Ok(listings)
    }

    /// A user's own submissions, any status
    pub async fn list_by_creator(&self, user: &User) -> Result<Vec<ArchiveEntry>, ArchiveServiceError> {
        Ok(self
            .repo
            .list_by_creator(user.id)
            .await
            .context("Failed to list submissions")?)
    }

    /// Raw entry, no visibility check
    pub async fn get_entry(&self, id: i64) -> Result<ArchiveEntry, ArchiveServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get entry")?
            .ok_or_else(|| ArchiveServiceError::NotFound(id.to_string()))
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern(CACHE_PATTERN_ENTRIES).await;
    }
}
