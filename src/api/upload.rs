//! Upload API endpoints and multipart parsing
//!
//! - POST /api/v1/upload/media/{entry_id} - Attach a file to an entry
//!   (its submitter or an admin)
//!
//! The multipart readers here are shared with the entry submission and
//! admin edit endpoints.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{MediaFile, MediaRole};
use crate::services::{CoverUpload, EntryInput};
use crate::storage::UploadedFile;

/// Build the upload router
pub fn router() -> Router<AppState> {
    Router::new().route("/media/{entry_id}", post(upload_media))
}

/// Parts of a media form: `file` plus optional `credits`
#[derive(Debug, Default)]
pub struct MediaForm {
    pub file: Option<UploadedFile>,
    pub credits: Option<String>,
}

impl MediaForm {
    pub fn into_cover(self) -> Option<CoverUpload> {
        let credits = self.credits;
        self.file.map(|file| CoverUpload { file, credits })
    }
}

/// Entry form: the `entry` JSON document plus an optional cover
#[derive(Debug)]
pub struct EntryForm {
    pub entry: EntryInput,
    pub cover: Option<CoverUpload>,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    tracing::debug!(error = %e, "Malformed multipart request");
    ApiError::validation_error(format!("Malformed multipart request: {}", e))
}

/// Read `entry`, `file` and `credits` fields. Unknown fields are skipped.
///
/// A file field with no name and no bytes is what browsers send for an
/// empty file input; it counts as no file.
async fn read_fields(
    multipart: &mut Multipart,
) -> Result<(Option<String>, MediaForm), ApiError> {
    let mut entry = None;
    let mut form = MediaForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "entry" => {
                entry = Some(field.text().await.map_err(multipart_error)?);
            }
            "credits" => {
                let credits = field.text().await.map_err(multipart_error)?;
                form.credits = Some(credits).filter(|c| !c.trim().is_empty());
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(multipart_error)?;
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                form.file = Some(UploadedFile {
                    file_name: if file_name.is_empty() {
                        "upload".to_string()
                    } else {
                        file_name
                    },
                    content_type,
                    data: data.to_vec(),
                });
            }
            _ => {}
        }
    }

    Ok((entry, form))
}

pub async fn read_entry_form(mut multipart: Multipart) -> Result<EntryForm, ApiError> {
    let (entry, media) = read_fields(&mut multipart).await?;
    let entry = entry.ok_or_else(|| ApiError::validation_error("Missing entry field"))?;
    let entry: EntryInput = serde_json::from_str(&entry)
        .map_err(|e| ApiError::validation_error(format!("Invalid entry: {}", e)))?;

    Ok(EntryForm {
        entry,
        cover: media.into_cover(),
    })
}

pub async fn read_media_form(mut multipart: Multipart) -> Result<MediaForm, ApiError> {
    let (_, media) = read_fields(&mut multipart).await?;
    Ok(media)
}

/// POST /api/v1/upload/media/{entry_id}
async fn upload_media(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(entry_id): Path<i64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MediaFile>), ApiError> {
    let entry = state.archive_service.get_entry(entry_id).await?;
    if !user.0.can_manage(entry.created_by) {
        return Err(ApiError::forbidden(
            "Only the submitter or an admin can add media to this entry",
        ));
    }

    let form = read_media_form(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| ApiError::validation_error("No file provided"))?;

    let media = state
        .media_service
        .attach(entry_id, &file, form.credits.as_deref(), MediaRole::Attachment)
        .await?;

    Ok((StatusCode::CREATED, Json(media)))
}
