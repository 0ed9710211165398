//! Media file model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Uploaded file attached to an archive entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: i64,
    pub archive_entry_id: i64,
    /// Public URL of the stored object
    pub file_url: String,
    /// Original file name as uploaded
    pub file_name: String,
    /// MIME type
    pub file_type: String,
    /// Size in MiB, rounded to two decimals
    pub file_size_mb: f64,
    pub credits: Option<String>,
    pub role: MediaRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaRole {
    #[default]
    Cover,
    Attachment,
}

impl fmt::Display for MediaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaRole::Cover => write!(f, "COVER"),
            MediaRole::Attachment => write!(f, "ATTACHMENT"),
        }
    }
}

impl FromStr for MediaRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "COVER" => Ok(MediaRole::Cover),
            "ATTACHMENT" => Ok(MediaRole::Attachment),
            _ => Err(anyhow::anyhow!("Invalid media role: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMediaFile {
    pub archive_entry_id: i64,
    pub file_url: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size_mb: f64,
    pub credits: Option<String>,
    pub role: MediaRole,
}
