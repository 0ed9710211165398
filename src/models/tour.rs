//! Tour and event models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntrySummary, Location};

/// Curated, ordered walk through archived spaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stop of a tour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourStop {
    pub position: i32,
    pub entry: EntrySummary,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourWithStops {
    #[serde(flatten)]
    pub tour: Tour,
    pub stops: Vec<TourStop>,
}

/// Community event listed alongside the archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub external_url: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub external_url: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
}
