//! Name lookup for the author and location pickers

use crate::db::repositories::{AuthorRepository, LocationRepository};
use crate::models::LookupItem;
use anyhow::Context;
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_LOOKUP_LIMIT: i64 = 8;
pub const MAX_LOOKUP_LIMIT: i64 = 25;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Unknown lookup table: {0}")]
    UnknownTable(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Tables that can be searched by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupTable {
    Authors,
    Locations,
}

impl FromStr for LookupTable {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authors" => Ok(LookupTable::Authors),
            "locations" => Ok(LookupTable::Locations),
            other => Err(LookupError::UnknownTable(other.to_string())),
        }
    }
}

pub struct LookupService {
    author_repo: Arc<dyn AuthorRepository>,
    location_repo: Arc<dyn LocationRepository>,
}

impl LookupService {
    pub fn new(
        author_repo: Arc<dyn AuthorRepository>,
        location_repo: Arc<dyn LocationRepository>,
    ) -> Self {
        Self {
            author_repo,
            location_repo,
        }
    }

    /// Case-insensitive substring search on `name`. A blank query returns
    /// nothing without touching the database.
    pub async fn search(
        &self,
        table: LookupTable,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<LookupItem>, LookupError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = clamp_limit(limit);

        let items = match table {
            LookupTable::Authors => self
                .author_repo
                .search(query, limit)
                .await
                .context("Failed to search authors")?,
            LookupTable::Locations => self
                .location_repo
                .search(query, limit)
                .await
                .context("Failed to search locations")?,
        };
        Ok(items)
    }
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LOOKUP_LIMIT).clamp(1, MAX_LOOKUP_LIMIT)
}
