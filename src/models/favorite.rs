//! Favorite model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntrySummary;

/// A user's bookmarked entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: i64,
    pub user_id: i64,
    pub archive_entry_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Favorite joined with the entry it points to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteWithEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub entry: EntrySummary,
}
