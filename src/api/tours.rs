//! Tour endpoints
//!
//! Public:
//! - GET /api/v1/tours - All tours
//! - GET /api/v1/tours/{id} - Tour with ordered stops
//!
//! Admin:
//! - POST /api/v1/admin/tours
//! - PUT /api/v1/admin/tours/{id}
//! - PUT /api/v1/admin/tours/{id}/stops - Replace stops with `entry_ids` in order
//! - DELETE /api/v1/admin/tours/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ListResponse;
use crate::models::{Tour, TourWithStops};
use crate::services::TourInput;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/tours", get(list_tours))
        .route("/tours/{id}", get(get_tour))
}

/// Build admin tour routes (requires admin middleware)
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/tours", post(create_tour))
        .route("/tours/{id}", put(update_tour).delete(delete_tour))
        .route("/tours/{id}/stops", put(set_stops))
}

#[derive(Debug, Deserialize)]
pub struct StopsRequest {
    pub entry_ids: Vec<i64>,
}

async fn list_tours(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Tour>>, ApiError> {
    let tours = state.tour_service.list().await?;
    Ok(Json(ListResponse::new(tours)))
}

async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TourWithStops>, ApiError> {
    Ok(Json(state.tour_service.get(id).await?))
}

async fn create_tour(
    State(state): State<AppState>,
    Json(body): Json<TourInput>,
) -> Result<(StatusCode, Json<Tour>), ApiError> {
    let tour = state.tour_service.create(&body).await?;
    Ok((StatusCode::CREATED, Json(tour)))
}

async fn update_tour(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<TourInput>,
) -> Result<Json<Tour>, ApiError> {
    Ok(Json(state.tour_service.update(id, &body).await?))
}

async fn set_stops(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StopsRequest>,
) -> Result<Json<TourWithStops>, ApiError> {
    Ok(Json(state.tour_service.set_stops(id, &body.entry_ids).await?))
}

async fn delete_tour(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.tour_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
