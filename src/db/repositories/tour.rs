//! Tour repository
//!
//! Tours own an ordered list of stops in `tour_spaces`. Stops are replaced
//! as a whole inside a transaction.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{EntrySummary, EntryType, Location, Tour, TourStop};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait TourRepository: Send + Sync {
    /// All tours, alphabetically
    async fn list(&self) -> Result<Vec<Tour>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tour>>;

    async fn create(&self, title: &str, description: Option<&str>) -> Result<Tour>;

    async fn update(&self, id: i64, title: &str, description: Option<&str>) -> Result<Option<Tour>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Stops ordered by position. Stops whose entry is no longer approved
    /// are left out; their position stays reserved.
    async fn list_stops(&self, tour_id: i64) -> Result<Vec<TourStop>>;

    /// Replace all stops; `entry_ids[i]` gets position `i + 1`
    async fn replace_stops(&self, tour_id: i64, entry_ids: &[i64]) -> Result<()>;
}

pub struct SqlxTourRepository {
    pool: DynDatabasePool,
}

impl SqlxTourRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TourRepository> {
        Arc::new(Self::new(pool))
    }
}

const STOPS_SQL: &str = r#"
    SELECT ts.position, e.id AS entry_id, e.title, e.entry_type, e.image_url,
           l.id AS location_id, l.name AS location_name, l.city, l.address,
           l.latitude, l.longitude
    FROM tour_spaces ts
    JOIN archive_entries e ON e.id = ts.archive_entry_id
    LEFT JOIN locations l ON l.id = e.location_id
    WHERE ts.tour_id = ? AND e.status = 'APPROVED'
    ORDER BY ts.position ASC
"#;

macro_rules! row_to_tour {
    ($row:expr) => {
        Tour {
            id: $row.get("id"),
            title: $row.get("title"),
            description: $row.get("description"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

macro_rules! row_to_stop {
    ($row:expr) => {{
        let entry_type: String = $row.get("entry_type");
        let location_id: Option<i64> = $row.get("location_id");
        let location_name: Option<String> = $row.get("location_name");
        let stop: Result<TourStop> = EntryType::from_str(&entry_type)
            .with_context(|| format!("Invalid entry type in database: {}", entry_type))
            .map(|entry_type| TourStop {
                position: $row.get("position"),
                entry: EntrySummary {
                    id: $row.get("entry_id"),
                    title: $row.get("title"),
                    entry_type,
                    image_url: $row.get("image_url"),
                },
                location: location_id.zip(location_name).map(|(id, name)| Location {
                    id,
                    name,
                    city: $row.get("city"),
                    address: $row.get("address"),
                    latitude: $row.get("latitude"),
                    longitude: $row.get("longitude"),
                }),
            });
        stop
    }};
}

#[async_trait]
impl TourRepository for SqlxTourRepository {
    async fn list(&self) -> Result<Vec<Tour>> {
        let sql = "SELECT id, title, description, created_at, updated_at FROM tours ORDER BY title ASC, id ASC";
        let tours = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .context("Failed to list tours")?
                .iter()
                .map(|row| row_to_tour!(row))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .context("Failed to list tours")?
                .iter()
                .map(|row| row_to_tour!(row))
                .collect(),
        };
        Ok(tours)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tour>> {
        let sql = "SELECT id, title, description, created_at, updated_at FROM tours WHERE id = ?";
        let tour = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get tour by ID")?
                .map(|row| row_to_tour!(row)),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get tour by ID")?
                .map(|row| row_to_tour!(row)),
        };
        Ok(tour)
    }

    async fn create(&self, title: &str, description: Option<&str>) -> Result<Tour> {
        let sql = "INSERT INTO tours (title, description, created_at, updated_at) VALUES (?, ?, ?, ?)";
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(title)
                .bind(description)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create tour")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(title)
                .bind(description)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create tour")?
                .last_insert_id() as i64,
        };

        Ok(Tour {
            id,
            title: title.to_string(),
            description: description.map(str::to_string),
            created_at: now,
            updated_at: now,
        })
    }

    async fn update(&self, id: i64, title: &str, description: Option<&str>) -> Result<Option<Tour>> {
        let sql = "UPDATE tours SET title = ?, description = ?, updated_at = ? WHERE id = ?";
        let now: DateTime<Utc> = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(title)
                .bind(description)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update tour")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(title)
                .bind(description)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update tour")?
                .rows_affected(),
        };

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM tours WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete tour")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete tour")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_stops(&self, tour_id: i64) -> Result<Vec<TourStop>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(STOPS_SQL)
                .bind(tour_id)
                .fetch_all(pool)
                .await
                .context("Failed to list tour stops")?
                .iter()
                .map(|row| row_to_stop!(row))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(STOPS_SQL)
                .bind(tour_id)
                .fetch_all(pool)
                .await
                .context("Failed to list tour stops")?
                .iter()
                .map(|row| row_to_stop!(row))
                .collect(),
        }
    }

    async fn replace_stops(&self, tour_id: i64, entry_ids: &[i64]) -> Result<()> {
        let delete_sql = "DELETE FROM tour_spaces WHERE tour_id = ?";
        let insert_sql =
            "INSERT INTO tour_spaces (tour_id, archive_entry_id, position) VALUES (?, ?, ?)";

        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                sqlx::query(delete_sql)
                    .bind(tour_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear tour stops")?;
                for (index, entry_id) in entry_ids.iter().enumerate() {
                    sqlx::query(insert_sql)
                        .bind(tour_id)
                        .bind(entry_id)
                        .bind(index as i32 + 1)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to insert tour stop")?;
                }
                tx.commit().await.context("Failed to commit tour stops")?;
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                sqlx::query(delete_sql)
                    .bind(tour_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear tour stops")?;
                for (index, entry_id) in entry_ids.iter().enumerate() {
                    sqlx::query(insert_sql)
                        .bind(tour_id)
                        .bind(entry_id)
                        .bind(index as i32 + 1)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to insert tour stop")?;
                }
                tx.commit().await.context("Failed to commit tour stops")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ArchiveEntryRepository, LocationRepository, SqlxArchiveEntryRepository,
        SqlxLocationRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{EntryStatus, NewArchiveEntry, NewLocation};

    async fn setup() -> (DynDatabasePool, SqlxTourRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (pool.clone(), SqlxTourRepository::new(pool))
    }

    async fn entry(pool: &DynDatabasePool, title: &str, location_id: Option<i64>) -> i64 {
        entry_with_status(pool, title, location_id, EntryStatus::Approved).await
    }

    async fn entry_with_status(
        pool: &DynDatabasePool,
        title: &str,
        location_id: Option<i64>,
        status: EntryStatus,
    ) -> i64 {
        SqlxArchiveEntryRepository::new(pool.clone())
            .create(&NewArchiveEntry {
                title: title.to_string(),
                description: "stop".into(),
                entry_type: EntryType::Space,
                keywords: vec![],
                origin_date: None,
                external_links: vec![],
                image_url: None,
                status,
                author_id: None,
                location_id,
                created_by: None,
            })
            .await
            .expect("Failed to create entry")
            .id
    }

    #[tokio::test]
    async fn test_tour_crud() {
        let (_pool, repo) = setup().await;
        let tour = repo.create("Ringstraße", Some("Along the ring")).await.unwrap();
        assert!(tour.id > 0);

        let updated = repo.update(tour.id, "Ring walk", None).await.unwrap().unwrap();
        assert_eq!(updated.title, "Ring walk");
        assert!(updated.description.is_none());

        assert_eq!(repo.list().await.unwrap().len(), 1);
        assert!(repo.delete(tour.id).await.unwrap());
        assert!(repo.get_by_id(tour.id).await.unwrap().is_none());
        assert!(repo.update(tour.id, "Gone", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_stops_keeps_order() {
        let (pool, repo) = setup().await;
        let location = SqlxLocationRepository::new(pool.clone())
            .create(&NewLocation {
                name: "Karlsplatz".into(),
                latitude: Some(48.2),
                longitude: Some(16.37),
                ..Default::default()
            })
            .await
            .unwrap();
        let a = entry(&pool, "Pavilion", Some(location.id)).await;
        let b = entry(&pool, "Museum", None).await;
        let tour = repo.create("Otto Wagner", None).await.unwrap();

        repo.replace_stops(tour.id, &[b, a]).await.unwrap();
        let stops = repo.list_stops(tour.id).await.unwrap();
        assert_eq!(stops.iter().map(|s| s.entry.id).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(stops[0].position, 1);
        assert!(stops[0].location.is_none());
        assert_eq!(stops[1].location.as_ref().map(|l| l.name.as_str()), Some("Karlsplatz"));

        repo.replace_stops(tour.id, &[a]).await.unwrap();
        assert_eq!(repo.list_stops(tour.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stops_skip_entries_that_are_not_approved() {
        let (pool, repo) = setup().await;
        let shown = entry(&pool, "Open stop", None).await;
        let pending = entry_with_status(&pool, "Pending stop", None, EntryStatus::Submitted).await;
        let tour = repo.create("Mixed", None).await.unwrap();
        repo.replace_stops(tour.id, &[pending, shown]).await.unwrap();

        let stops = repo.list_stops(tour.id).await.unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].entry.id, shown);
        assert_eq!(stops[0].position, 2);

        SqlxArchiveEntryRepository::new(pool.clone())
            .set_status(shown, EntryStatus::Declined)
            .await
            .unwrap();
        assert!(repo.list_stops(tour.id).await.unwrap().is_empty());
    }
}
