//! Curated tours
//!
//! A tour is an ordered list of archive entries. Admins curate them; the
//! map page and the tour pages read them.

use crate::db::repositories::{ArchiveEntryRepository, TourRepository};
use crate::models::{EntryStatus, Tour, TourWithStops};
use crate::services::form::trimmed_or_none;
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum TourServiceError {
    #[error("Tour not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TourInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl TourInput {
    fn validated(&self) -> Result<(String, Option<String>), TourServiceError> {
        let title = trimmed_or_none(Some(self.title.as_str()))
            .ok_or_else(|| TourServiceError::ValidationError("Tour title is required".to_string()))?;
        Ok((title, trimmed_or_none(self.description.as_deref())))
    }
}

pub struct TourService {
    repo: Arc<dyn TourRepository>,
    entry_repo: Arc<dyn ArchiveEntryRepository>,
}

impl TourService {
    pub fn new(repo: Arc<dyn TourRepository>, entry_repo: Arc<dyn ArchiveEntryRepository>) -> Self {
        Self { repo, entry_repo }
    }

    pub async fn list(&self) -> Result<Vec<Tour>, TourServiceError> {
        Ok(self.repo.list().await.context("Failed to list tours")?)
    }

    /// Tour with its stops in order
    pub async fn get(&self, id: i64) -> Result<TourWithStops, TourServiceError> {
        let tour = self.find(id).await?;
        let stops = self
            .repo
            .list_stops(id)
            .await
            .context("Failed to list tour stops")?;
        Ok(TourWithStops { tour, stops })
    }

    pub async fn create(&self, input: &TourInput) -> Result<Tour, TourServiceError> {
        let (title, description) = input.validated()?;
        let tour = self
            .repo
            .create(&title, description.as_deref())
            .await
            .context("Failed to create tour")?;
        tracing::info!(tour_id = tour.id, "Tour created");
        Ok(tour)
    }

    pub async fn update(&self, id: i64, input: &TourInput) -> Result<Tour, TourServiceError> {
        let (title, description) = input.validated()?;
        self.repo
            .update(id, &title, description.as_deref())
            .await
            .context("Failed to update tour")?
            .ok_or_else(|| TourServiceError::NotFound(id.to_string()))
    }

    pub async fn delete(&self, id: i64) -> Result<(), TourServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete tour")? {
            return Err(TourServiceError::NotFound(id.to_string()));
        }
        tracing::info!(tour_id = id, "Tour deleted");
        Ok(())
    }

    /// Replace the ordered stops of a tour.
    ///
    /// Tours are public, so every stop must be an approved entry.
    ///
    /// # Arguments
    /// * `tour_id` - The tour to change
    /// * `entry_ids` - Entries in stop order; position `i + 1` for index `i`
    ///
    /// # Returns
    /// The tour with its new stops. Repeated, missing and unapproved
    /// entries are rejected before anything is written.
    pub async fn set_stops(
        &self,
        tour_id: i64,
        entry_ids: &[i64],
    ) -> Result<TourWithStops, TourServiceError> {
        self.find(tour_id).await?;

        let mut seen = HashSet::new();
        if let Some(dup) = entry_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(TourServiceError::ValidationError(format!(
                "Entry {} appears more than once",
                dup
            )));
        }

        for &entry_id in entry_ids {
            let entry = self
                .entry_repo
                .get_by_id(entry_id)
                .await
                .context("Failed to get entry")?;
            match entry {
                Some(entry) if entry.status == EntryStatus::Approved => {}
                Some(_) => {
                    return Err(TourServiceError::ValidationError(format!(
                        "Entry {} is not approved",
                        entry_id
                    )))
                }
                None => {
                    return Err(TourServiceError::ValidationError(format!(
                        "Entry {} does not exist",
                        entry_id
                    )))
                }
            }
        }

        self.repo
            .replace_stops(tour_id, entry_ids)
            .await
            .context("Failed to replace tour stops")?;
        tracing::info!(tour_id, stops = entry_ids.len(), "Tour stops replaced");

        self.get(tour_id).await
    }

    async fn find(&self, id: i64) -> Result<Tour, TourServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tour")?
            .ok_or_else(|| TourServiceError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxArchiveEntryRepository, SqlxTourRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{EntryType, NewArchiveEntry};

    async fn setup() -> (TourService, Vec<i64>) {
        let (service, ids, _) = setup_with_entries().await;
        (service, ids)
    }

    async fn setup_with_entries() -> (TourService, Vec<i64>, Arc<dyn ArchiveEntryRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let entries = SqlxArchiveEntryRepository::boxed(pool.clone());
        let mut ids = Vec::new();
        for title in ["Stadtbahnbogen", "Zacherlhaus", "Looshaus"] {
            let entry = entries
                .create(&NewArchiveEntry {
                    title: title.into(),
                    description: "Stop".into(),
                    entry_type: EntryType::Space,
                    keywords: vec![],
                    origin_date: None,
                    external_links: vec![],
                    image_url: None,
                    status: EntryStatus::Approved,
                    author_id: None,
                    location_id: None,
                    created_by: None,
                })
                .await
                .unwrap();
            ids.push(entry.id);
        }

        (
            TourService::new(SqlxTourRepository::boxed(pool), entries.clone()),
            ids,
            entries,
        )
    }

    fn input(title: &str) -> TourInput {
        TourInput {
            title: title.into(),
            description: Some("  ".into()),
        }
    }

    #[tokio::test]
    async fn test_create_requires_title() {
        let (service, _) = setup().await;
        assert!(matches!(
            service.create(&input("   ")).await,
            Err(TourServiceError::ValidationError(_))
        ));

        let tour = service.create(&input(" Ringstraße ")).await.unwrap();
        assert_eq!(tour.title, "Ringstraße");
        assert_eq!(tour.description, None);
    }

    #[tokio::test]
    async fn test_set_stops_orders_entries() {
        let (service, ids) = setup().await;
        let tour = service.create(&input("Otto Wagner walk")).await.unwrap();

        let order = vec![ids[2], ids[0]];
        let with_stops = service.set_stops(tour.id, &order).await.unwrap();
        let titles: Vec<_> = with_stops.stops.iter().map(|s| s.entry.title.as_str()).collect();
        assert_eq!(titles, vec!["Looshaus", "Stadtbahnbogen"]);
        assert_eq!(with_stops.stops[0].position, 1);

        let replaced = service.set_stops(tour.id, &[ids[1]]).await.unwrap();
        assert_eq!(replaced.stops.len(), 1);
        assert_eq!(replaced.stops[0].entry.title, "Zacherlhaus");
    }

    #[tokio::test]
    async fn test_set_stops_rejects_bad_input() {
        let (service, ids) = setup().await;
        let tour = service.create(&input("Tour")).await.unwrap();
        service.set_stops(tour.id, &[ids[0]]).await.unwrap();

        assert!(matches!(
            service.set_stops(tour.id, &[ids[1], ids[1]]).await,
            Err(TourServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.set_stops(tour.id, &[ids[1], 4242]).await,
            Err(TourServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.set_stops(9999, &[ids[0]]).await,
            Err(TourServiceError::NotFound(_))
        ));

        let unchanged = service.get(tour.id).await.unwrap();
        assert_eq!(unchanged.stops.len(), 1);
        assert_eq!(unchanged.stops[0].entry.id, ids[0]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (service, _) = setup().await;
        let tour = service.create(&input("Old")).await.unwrap();

        let updated = service.update(tour.id, &input("New")).await.unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(service.list().await.unwrap().len(), 1);

        service.delete(tour.id).await.unwrap();
        assert!(matches!(service.get(tour.id).await, Err(TourServiceError::NotFound(_))));
        assert!(matches!(service.delete(tour.id).await, Err(TourServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_declined_entry_leaves_public_tour() {
        let (service, ids, entries) = setup_with_entries().await;
        let tour = service.create(&input("Vorstadt")).await.unwrap();
        service.set_stops(tour.id, &[ids[0], ids[1]]).await.unwrap();

        entries.set_status(ids[0], EntryStatus::Declined).await.unwrap();
        let stops = service.get(tour.id).await.unwrap().stops;
        let titles: Vec<_> = stops.iter().map(|s| s.entry.title.as_str()).collect();
        assert_eq!(titles, vec!["Zacherlhaus"]);

        let err = service.set_stops(tour.id, &[ids[0]]).await.unwrap_err();
        assert!(matches!(err, TourServiceError::ValidationError(ref m) if m.contains("not approved")));
        assert_eq!(service.get(tour.id).await.unwrap().stops.len(), 1);
    }
}
