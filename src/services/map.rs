//! Map view of approved, geocoded entries

use crate::models::{EntryListing, EntryType};
use crate::services::archive::{ArchiveService, ArchiveServiceError};
use serde::Serialize;
use std::sync::Arc;

/// Vienna, used when nothing on the map has coordinates
pub const DEFAULT_CENTER: MapPoint = MapPoint {
    lat: 48.2082,
    lng: 16.3738,
};
pub const DEFAULT_ZOOM: u8 = 12;
pub const FOCUS_ZOOM: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapMarker {
    pub entry_id: i64,
    pub title: String,
    pub entry_type: EntryType,
    pub position: MapPoint,
    pub location_name: String,
    pub city: Option<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub center: MapPoint,
    pub zoom: u8,
    /// Set when the view is centred on a requested entry
    pub focused_entry_id: Option<i64>,
    pub markers: Vec<MapMarker>,
}

fn marker(listing: &EntryListing) -> Option<MapMarker> {
    let location = listing.location.as_ref()?;
    let (lat, lng) = location.coordinates()?;
    Some(MapMarker {
        entry_id: listing.entry.id,
        title: listing.entry.title.clone(),
        entry_type: listing.entry.entry_type,
        position: MapPoint { lat, lng },
        location_name: location.name.clone(),
        city: location.city.clone(),
        cover_url: listing.cover_url.clone(),
    })
}

/// Pick centre and zoom for a set of markers
pub fn build_view(markers: Vec<MapMarker>, focus_entry_id: Option<i64>) -> MapView {
    let focused = focus_entry_id.and_then(|id| markers.iter().find(|m| m.entry_id == id));

    let (center, zoom, focused_entry_id) = match (focused, markers.first()) {
        (Some(m), _) => (m.position, FOCUS_ZOOM, Some(m.entry_id)),
        (None, Some(first)) => (first.position, DEFAULT_ZOOM, None),
        (None, None) => (DEFAULT_CENTER, DEFAULT_ZOOM, None),
    };

    MapView {
        center,
        zoom,
        focused_entry_id,
        markers,
    }
}

pub struct MapService {
    archive: Arc<ArchiveService>,
}

impl MapService {
    pub fn new(archive: Arc<ArchiveService>) -> Self {
        Self { archive }
    }

    /// Markers for approved entries whose location has coordinates.
    ///
    /// # Arguments
    /// * `focus_entry_id` - Entry to centre on, if it has a marker
    ///
    /// # Returns
    /// The markers plus a centre: the focused marker at street zoom, else
    /// the first marker, else the default city view.
    pub async fn map_view(&self, focus_entry_id: Option<i64>) -> Result<MapView, ArchiveServiceError> {
        let listings = self.archive.approved_listings().await?;
        let markers = listings.iter().filter_map(marker).collect();
        Ok(build_view(markers, focus_entry_id))
    }
}
