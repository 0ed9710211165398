//! Archive entry model
//!
//! - `ArchiveEntry`: a submitted space, artifact or photograph
//! - `EntryType` / `EntryStatus`: stored as text columns
//! - `NewArchiveEntry`: the persisted fields of a create or update
//! - `EntryListing`: an entry joined with author, location and cover

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{AuthorRef, Location};

/// Archive entry entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub entry_type: EntryType,
    pub keywords: Vec<String>,
    /// Free text as entered ("1947", "06.1950", "circa 1900")
    pub origin_date: Option<String>,
    pub external_links: Vec<String>,
    /// External cover image URL
    pub image_url: Option<String>,
    pub status: EntryStatus,
    pub author_id: Option<i64>,
    pub location_id: Option<i64>,
    /// Submitting user; `None` for anonymous submissions
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArchiveEntry {
    pub fn is_approved(&self) -> bool {
        self.status == EntryStatus::Approved
    }
}

/// Kind of archived thing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Space,
    Artifact,
    Photography,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Space => write!(f, "Space"),
            EntryType::Artifact => write!(f, "Artifact"),
            EntryType::Photography => write!(f, "Photography"),
        }
    }
}

impl FromStr for EntryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "space" => Ok(EntryType::Space),
            "artifact" => Ok(EntryType::Artifact),
            "photography" => Ok(EntryType::Photography),
            _ => Err(anyhow::anyhow!("Invalid entry type: {}", s)),
        }
    }
}

/// Moderation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    /// Awaiting review; every new or resubmitted entry starts here
    #[default]
    Submitted,
    /// Publicly visible
    Approved,
    Declined,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Submitted => write!(f, "SUBMITTED"),
            EntryStatus::Approved => write!(f, "APPROVED"),
            EntryStatus::Declined => write!(f, "DECLINED"),
        }
    }
}

impl FromStr for EntryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SUBMITTED" => Ok(EntryStatus::Submitted),
            "APPROVED" => Ok(EntryStatus::Approved),
            "DECLINED" => Ok(EntryStatus::Declined),
            _ => Err(anyhow::anyhow!("Invalid entry status: {}", s)),
        }
    }
}

/// Persisted fields of an entry write
#[derive(Debug, Clone)]
pub struct NewArchiveEntry {
    pub title: String,
    pub description: String,
    pub entry_type: EntryType,
    pub keywords: Vec<String>,
    pub origin_date: Option<String>,
    pub external_links: Vec<String>,
    pub image_url: Option<String>,
    pub status: EntryStatus,
    pub author_id: Option<i64>,
    pub location_id: Option<i64>,
    pub created_by: Option<i64>,
}

/// Entry with its related records, as shown in lists and on the map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryListing {
    #[serde(flatten)]
    pub entry: ArchiveEntry,
    pub author: Option<AuthorRef>,
    pub location: Option<Location>,
    /// First cover media URL, else the entry's external image URL
    pub cover_url: Option<String>,
}

/// Minimal entry info embedded in favorites and tour stops
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntrySummary {
    pub id: i64,
    pub title: String,
    pub entry_type: EntryType,
    pub image_url: Option<String>,
}

impl From<&ArchiveEntry> for EntrySummary {
    fn from(entry: &ArchiveEntry) -> Self {
        Self {
            id: entry.id,
            title: entry.title.clone(),
            entry_type: entry.entry_type,
            image_url: entry.image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_parsing_is_lenient() {
        assert_eq!(EntryType::from_str(" space ").unwrap(), EntryType::Space);
        assert_eq!(EntryType::from_str("PHOTOGRAPHY").unwrap(), EntryType::Photography);
        assert!(EntryType::from_str("Building").is_err());
        assert_eq!(EntryType::Artifact.to_string(), "Artifact");
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(serde_json::to_value(EntryStatus::Approved).unwrap(), "APPROVED");
        assert_eq!(EntryStatus::from_str("declined").unwrap(), EntryStatus::Declined);
        assert_eq!(EntryStatus::default(), EntryStatus::Submitted);
    }
}
