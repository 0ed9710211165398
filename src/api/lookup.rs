//! Name lookup for the author and location pickers
//!
//! - GET /api/v1/lookup/{table}?q=&limit= - `table` is `authors` or `locations`

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::LookupItem;
use crate::services::LookupTable;

pub fn router() -> Router<AppState> {
    Router::new().route("/lookup/{table}", get(search))
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// GET /api/v1/lookup/{table}
async fn search(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<Vec<LookupItem>>, ApiError> {
    let table: LookupTable = table.parse()?;
    let items = state
        .lookup_service
        .search(table, &query.q, query.limit)
        .await?;
    Ok(Json(items))
}
