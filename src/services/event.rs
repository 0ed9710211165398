//! Community events

use crate::db::repositories::EventRepository;
use crate::models::{Event, NewEvent};
use crate::services::form::trimmed_or_none;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EventServiceError {
    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct EventService {
    repo: Arc<dyn EventRepository>,
}

impl EventService {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }

    /// Events starting at or after `now`, soonest first
    pub async fn upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Event>, EventServiceError> {
        Ok(self
            .repo
            .list_upcoming(now)
            .await
            .context("Failed to list events")?)
    }

    pub async fn create(&self, input: NewEvent) -> Result<Event, EventServiceError> {
        let title = trimmed_or_none(Some(input.title.as_str()))
            .ok_or_else(|| EventServiceError::ValidationError("Event title is required".to_string()))?;
        if input.end_at.is_some_and(|end| end < input.start_at) {
            return Err(EventServiceError::ValidationError(
                "Event cannot end before it starts".to_string(),
            ));
        }

        let event = self
            .repo
            .create(&NewEvent {
                title,
                description: trimmed_or_none(input.description.as_deref()),
                location: trimmed_or_none(input.location.as_deref()),
                external_url: trimmed_or_none(input.external_url.as_deref()),
                start_at: input.start_at,
                end_at: input.end_at,
            })
            .await
            .context("Failed to create event")?;

        tracing::info!(event_id = event.id, start_at = %event.start_at, "Event created");
        Ok(event)
    }

    pub async fn delete(&self, id: i64) -> Result<(), EventServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete event")? {
            return Err(EventServiceError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxEventRepository;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> EventService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        EventService::new(SqlxEventRepository::boxed(pool))
    }

    fn event(title: &str, start_at: DateTime<Utc>) -> NewEvent {
        NewEvent {
            title: title.into(),
            description: None,
            location: Some(" Volkskundemuseum ".into()),
            external_url: None,
            start_at,
            end_at: None,
        }
    }

    #[tokio::test]
    async fn test_upcoming_skips_past_events() {
        let service = setup().await;
        let now = Utc::now();

        service.create(event("Past", now - Duration::days(2))).await.unwrap();
        service.create(event("Later", now + Duration::days(10))).await.unwrap();
        let soon = service.create(event("Soon", now + Duration::days(1))).await.unwrap();
        assert_eq!(soon.location.as_deref(), Some("Volkskundemuseum"));

        let titles: Vec<_> = service
            .upcoming(now)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Soon", "Later"]);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = setup().await;
        let now = Utc::now();

        assert!(matches!(
            service.create(event(" ", now)).await,
            Err(EventServiceError::ValidationError(_))
        ));

        let mut backwards = event("Backwards", now);
        backwards.end_at = Some(now - Duration::hours(1));
        assert!(matches!(
            service.create(backwards).await,
            Err(EventServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let service = setup().await;
        let created = service.create(event("Gone", Utc::now() + Duration::days(1))).await.unwrap();
        service.delete(created.id).await.unwrap();
        assert!(matches!(
            service.delete(created.id).await,
            Err(EventServiceError::NotFound(_))
        ));
    }
}
