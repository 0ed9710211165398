//! Event repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Event, NewEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Events starting at or after `now`, soonest first
    async fn list_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Event>>;

    async fn create(&self, event: &NewEvent) -> Result<Event>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxEventRepository {
    pool: DynDatabasePool,
}

impl SqlxEventRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EventRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! row_to_event {
    ($row:expr) => {
        Event {
            id: $row.get("id"),
            title: $row.get("title"),
            description: $row.get("description"),
            location: $row.get("location"),
            external_url: $row.get("external_url"),
            start_at: $row.get("start_at"),
            end_at: $row.get("end_at"),
            created_at: $row.get("created_at"),
        }
    };
}

#[async_trait]
impl EventRepository for SqlxEventRepository {
    async fn list_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let sql = r#"
            SELECT id, title, description, location, external_url, start_at, end_at, created_at
            FROM events
            WHERE start_at >= ?
            ORDER BY start_at ASC, id ASC
        "#;
        let events = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(now)
                .fetch_all(pool)
                .await
                .context("Failed to list events")?
                .iter()
                .map(|row| row_to_event!(row))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(now)
                .fetch_all(pool)
                .await
                .context("Failed to list events")?
                .iter()
                .map(|row| row_to_event!(row))
                .collect(),
        };
        Ok(events)
    }

    async fn create(&self, event: &NewEvent) -> Result<Event> {
        let sql = r#"
            INSERT INTO events (title, description, location, external_url, start_at, end_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&event.title)
                .bind(&event.description)
                .bind(&event.location)
                .bind(&event.external_url)
                .bind(event.start_at)
                .bind(event.end_at)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create event")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&event.title)
                .bind(&event.description)
                .bind(&event.location)
                .bind(&event.external_url)
                .bind(event.start_at)
                .bind(event.end_at)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create event")?
                .last_insert_id() as i64,
        };

        Ok(Event {
            id,
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            external_url: event.external_url.clone(),
            start_at: event.start_at,
            end_at: event.end_at,
            created_at: now,
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM events WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete event")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete event")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}
