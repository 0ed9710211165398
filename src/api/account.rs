//! Account endpoints for the logged-in user
//!
//! - GET /api/v1/account/favorites - Favorited entries, newest first
//! - POST /api/v1/account/favorites/{entry_id} - Add a favorite
//! - DELETE /api/v1/account/favorites/{entry_id} - Remove a favorite
//! - POST /api/v1/account/favorites/{entry_id}/toggle - Flip a favorite
//! - GET /api/v1/account/submissions - Own entries in any status
//! - PUT /api/v1/account/submissions/{id} - Edit and resubmit an own entry

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::ListResponse;
use crate::models::{ArchiveEntry, FavoriteWithEntry};
use crate::services::ResubmitInput;

/// Build account routes (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/favorites", get(list_favorites))
        .route(
            "/favorites/{entry_id}",
            post(add_favorite).delete(remove_favorite),
        )
        .route("/favorites/{entry_id}/toggle", post(toggle_favorite))
        .route("/submissions", get(list_submissions))
        .route("/submissions/{id}", put(resubmit))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FavoriteStateResponse {
    pub entry_id: i64,
    pub favorite: bool,
}

/// GET /api/v1/account/favorites
async fn list_favorites(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ListResponse<FavoriteWithEntry>>, ApiError> {
    let favorites = state.favorite_service.list(&user.0).await?;
    Ok(Json(ListResponse::new(favorites)))
}

/// POST /api/v1/account/favorites/{entry_id}
///
/// Adding an existing favorite is not an error.
async fn add_favorite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(entry_id): Path<i64>,
) -> Result<Json<FavoriteStateResponse>, ApiError> {
    state.favorite_service.add(&user.0, entry_id).await?;
    Ok(Json(FavoriteStateResponse {
        entry_id,
        favorite: true,
    }))
}

/// DELETE /api/v1/account/favorites/{entry_id}
async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(entry_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.favorite_service.remove(user.0.id, entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/account/favorites/{entry_id}/toggle
async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(entry_id): Path<i64>,
) -> Result<Json<FavoriteStateResponse>, ApiError> {
    let favorite = state.favorite_service.toggle(&user.0, entry_id).await?;
    Ok(Json(FavoriteStateResponse { entry_id, favorite }))
}

/// GET /api/v1/account/submissions
async fn list_submissions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ListResponse<ArchiveEntry>>, ApiError> {
    let entries = state.archive_service.list_by_creator(&user.0).await?;
    Ok(Json(ListResponse::new(entries)))
}

/// PUT /api/v1/account/submissions/{id}
///
/// The entry goes back to SUBMITTED.
async fn resubmit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ResubmitInput>,
) -> Result<Json<ArchiveEntry>, ApiError> {
    let entry = state.archive_service.resubmit(&user.0, id, body).await?;
    Ok(Json(entry))
}
