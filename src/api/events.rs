//! Event endpoints
//!
//! - GET /api/v1/events - Upcoming events, soonest first
//! - POST /api/v1/admin/events - Create an event
//! - DELETE /api/v1/admin/events/{id} - Delete an event

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ListResponse;
use crate::models::{Event, NewEvent};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/events", get(upcoming_events))
}

/// Build admin event routes (requires admin middleware)
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/{id}", delete(delete_event))
}

async fn upcoming_events(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Event>>, ApiError> {
    let events = state.event_service.upcoming(Utc::now()).await?;
    Ok(Json(ListResponse::new(events)))
}

async fn create_event(
    State(state): State<AppState>,
    Json(body): Json<NewEvent>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let event = state.event_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.event_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
