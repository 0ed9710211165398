//! Location repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Location, LookupItem, NewLocation};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn create(&self, location: &NewLocation) -> Result<Location>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>>;

    /// Case-insensitive substring search on name, ordered by name
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<LookupItem>>;
}

pub struct SqlxLocationRepository {
    pool: DynDatabasePool,
}

impl SqlxLocationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LocationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LocationRepository for SqlxLocationRepository {
    async fn create(&self, location: &NewLocation) -> Result<Location> {
        let sql = r#"
            INSERT INTO locations (name, city, address, latitude, longitude, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&location.name)
                .bind(&location.city)
                .bind(&location.address)
                .bind(location.latitude)
                .bind(location.longitude)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create location")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&location.name)
                .bind(&location.city)
                .bind(&location.address)
                .bind(location.latitude)
                .bind(location.longitude)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create location")?
                .last_insert_id() as i64,
        };

        Ok(Location {
            id,
            name: location.name.clone(),
            city: location.city.clone(),
            address: location.address.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>> {
        let sql = "SELECT id, name, city, address, latitude, longitude FROM locations WHERE id = ?";
        let location = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get location by ID")?
                .map(|row| Location {
                    id: row.get("id"),
                    name: row.get("name"),
                    city: row.get("city"),
                    address: row.get("address"),
                    latitude: row.get("latitude"),
                    longitude: row.get("longitude"),
                }),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get location by ID")?
                .map(|row| Location {
                    id: row.get("id"),
                    name: row.get("name"),
                    city: row.get("city"),
                    address: row.get("address"),
                    latitude: row.get("latitude"),
                    longitude: row.get("longitude"),
                }),
        };
        Ok(location)
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<LookupItem>> {
        let sql = "SELECT id, name FROM locations WHERE LOWER(name) LIKE ? ORDER BY name LIMIT ?";
        let pattern = format!("%{}%", query.to_lowercase());
        let items = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(pool)
                .await
                .context("Failed to search locations")?
                .iter()
                .map(|row| LookupItem { id: row.get("id"), name: row.get("name") })
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(pool)
                .await
                .context("Failed to search locations")?
                .iter()
                .map(|row| LookupItem { id: row.get("id"), name: row.get("name") })
                .collect(),
        };
        Ok(items)
    }
}
