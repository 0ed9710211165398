//! Author and location resolution for entry forms
//!
//! A form either selects an existing record by id or names a new one.

use crate::db::repositories::{AuthorRepository, LocationRepository};
use crate::models::{NewAuthor, NewLocation};
use crate::services::form::trimmed_or_none;
use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("Selected author {0} does not exist")]
    UnknownAuthor(i64),

    #[error("Selected location {0} does not exist")]
    UnknownLocation(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Author section of an entry form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorChoice {
    /// Existing author picked from the lookup
    pub id: Option<i64>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
}

/// Location section of an entry form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationChoice {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub struct EntityService {
    author_repo: Arc<dyn AuthorRepository>,
    location_repo: Arc<dyn LocationRepository>,
}

impl EntityService {
    pub fn new(
        author_repo: Arc<dyn AuthorRepository>,
        location_repo: Arc<dyn LocationRepository>,
    ) -> Self {
        Self {
            author_repo,
            location_repo,
        }
    }

    /// Resolve the author section to an id.
    ///
    /// A selected id is only checked, never inserted. A new name that
    /// collides with an existing author resolves to that author.
    pub async fn ensure_author_id(&self, choice: &AuthorChoice) -> Result<Option<i64>, EntityError> {
        if let Some(id) = choice.id {
            return match self.author_repo.get_by_id(id).await.context("Failed to get author")? {
                Some(author) => Ok(Some(author.id)),
                None => Err(EntityError::UnknownAuthor(id)),
            };
        }

        let Some(name) = trimmed_or_none(choice.name.as_deref()) else {
            return Ok(None);
        };

        let new_author = NewAuthor {
            name,
            bio: trimmed_or_none(choice.bio.as_deref()),
            birth_date: choice.birth_date,
            death_date: choice.death_date,
        };

        match self.author_repo.create(&new_author).await {
            Ok(author) => {
                tracing::debug!(author_id = author.id, "Created author");
                Ok(Some(author.id))
            }
            Err(e) if crate::db::is_unique_violation(&e) => {
                let existing = self
                    .author_repo
                    .get_by_name(&new_author.name)
                    .await
                    .context("Failed to get author by name")?
                    .ok_or_else(|| e.context("Duplicate author vanished"))?;
                Ok(Some(existing.id))
            }
            Err(e) => Err(e.context("Failed to create author").into()),
        }
    }

    /// Resolve the location section to an id. Insert failures propagate.
    pub async fn ensure_location_id(
        &self,
        choice: &LocationChoice,
    ) -> Result<Option<i64>, EntityError> {
        if let Some(id) = choice.id {
            return match self
                .location_repo
                .get_by_id(id)
                .await
                .context("Failed to get location")?
            {
                Some(location) => Ok(Some(location.id)),
                None => Err(EntityError::UnknownLocation(id)),
            };
        }

        let Some(name) = trimmed_or_none(choice.name.as_deref()) else {
            return Ok(None);
        };

        let location = self
            .location_repo
            .create(&NewLocation {
                name,
                city: trimmed_or_none(choice.city.as_deref()),
                address: trimmed_or_none(choice.address.as_deref()),
                latitude: choice.latitude,
                longitude: choice.longitude,
            })
            .await
            .context("Failed to create location")?;

        tracing::debug!(location_id = location.id, "Created location");
        Ok(Some(location.id))
    }
}
