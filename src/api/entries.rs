//! Archive entry API endpoints
//!
//! - GET /api/v1/entries - Approved entries, filtered and sorted
//! - GET /api/v1/entries/{id} - Entry detail with author, location and media
//! - POST /api/v1/entries - Submit an entry (anonymous allowed, multipart)

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, OptionalUser};
use crate::api::responses::{IdResponse, ListResponse};
use crate::api::upload::read_entry_form;
use crate::models::EntryListing;
use crate::services::{ArchiveFilter, EntryDetail};

/// Routes that need no session
pub fn public_router() -> Router<AppState> {
    Router::new().route("/entries", get(list_entries))
}

/// Routes behind `optional_auth`
pub fn optional_router() -> Router<AppState> {
    Router::new()
        .route("/entries", post(submit_entry))
        .route("/entries/{id}", get(get_entry))
}

/// GET /api/v1/entries?q=&type=&city=&location=&from=&to=&sort=
async fn list_entries(
    State(state): State<AppState>,
    Query(filter): Query<ArchiveFilter>,
) -> Result<Json<ListResponse<EntryListing>>, ApiError> {
    let listings = state.archive_service.list_approved(&filter).await?;
    Ok(Json(ListResponse::new(listings)))
}

/// GET /api/v1/entries/{id}
///
/// Entries that are not approved answer 404 unless the viewer submitted
/// them or is an admin.
async fn get_entry(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<EntryDetail>, ApiError> {
    let detail = state.archive_service.get_visible(id, user.as_ref()).await?;
    Ok(Json(detail))
}

/// POST /api/v1/entries
///
/// Multipart form with an `entry` JSON field and an optional cover `file`
/// with `credits`. Uploading a file requires a session.
async fn submit_entry(
    State(state): State<AppState>,
    user: OptionalUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let form = read_entry_form(multipart).await?;
    let entry = state
        .archive_service
        .create_entry(user.as_ref(), form.entry, form.cover)
        .await?;

    Ok((StatusCode::CREATED, Json(IdResponse { id: entry.id })))
}
