//! Map endpoint
//!
//! - GET /api/v1/map?entry_id= - Markers for approved entries with
//!   coordinates, centred on `entry_id` when given

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::services::MapView;

pub fn router() -> Router<AppState> {
    Router::new().route("/map", get(map_view))
}

#[derive(Debug, Deserialize)]
pub struct MapQuery {
    #[serde(default)]
    pub entry_id: Option<i64>,
}

async fn map_view(
    State(state): State<AppState>,
    Query(query): Query<MapQuery>,
) -> Result<Json<MapView>, ApiError> {
    let view = state.map_service.map_view(query.entry_id).await?;
    Ok(Json(view))
}
