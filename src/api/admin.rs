//! Admin moderation endpoints
//!
//! - GET /api/v1/admin/entries?status= - Entries by status (default SUBMITTED)
//! - PUT /api/v1/admin/entries/{id} - Edit an entry (multipart, optional cover)
//! - PUT /api/v1/admin/entries/{id}/status - Approve or decline
//! - DELETE /api/v1/admin/entries/{id} - Delete an entry
//!
//! Tour and event curation routes live in their own modules and are
//! nested under the same admin guard.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::ListResponse;
use crate::api::upload::read_entry_form;
use crate::models::{ArchiveEntry, EntryListing, EntryStatus};

/// Build admin entry routes (requires admin middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/entries", get(list_entries))
        .route("/entries/{id}", put(update_entry).delete(delete_entry))
        .route("/entries/{id}/status", put(set_status))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: EntryStatus,
}

/// GET /api/v1/admin/entries?status=SUBMITTED
async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ListResponse<EntryListing>>, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => EntryStatus::Submitted,
        Some(raw) => raw
            .parse::<EntryStatus>()
            .map_err(|e| ApiError::validation_error(e.to_string()))?,
    };

    let listings = state.archive_service.list_by_status(status).await?;
    Ok(Json(ListResponse::new(listings)))
}

/// PUT /api/v1/admin/entries/{id}
///
/// Same multipart shape as a submission; the path id wins over any
/// `entry_id` in the form.
async fn update_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<ArchiveEntry>, ApiError> {
    let mut form = read_entry_form(multipart).await?;
    form.entry.entry_id = Some(id);

    let entry = state
        .archive_service
        .update_entry(&user.0, form.entry, form.cover)
        .await?;
    Ok(Json(entry))
}

/// PUT /api/v1/admin/entries/{id}/status
async fn set_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<StatusCode, ApiError> {
    state.archive_service.set_status(id, body.status).await?;
    tracing::debug!(entry_id = id, admin_id = user.0.id, "Moderation applied");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/admin/entries/{id}
async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.archive_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
