//! Media object storage
//!
//! Uploaded files are written under `entries/<uuid>.<ext>` inside a bucket
//! and exposed through a public URL. The backend is a trait so the local
//! disk store can be swapped for a remote one.

pub mod local;

pub use local::LocalStorage;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Storage backend
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Write a new object. Fails if `path` already exists in `bucket`.
    async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<()>;

    /// Remove an object; missing objects are ignored
    async fn delete(&self, bucket: &str, path: &str) -> Result<()>;

    /// URL under which the object is publicly served
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// A file received from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original file name as sent by the client
    pub file_name: String,
    /// MIME type, if the client sent one
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// MIME type, `unknown` when the client sent none
    pub fn mime_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoredObject {
    pub path: String,
    pub public_url: String,
}

/// Extension after the last `.` of a file name, else `bin`.
///
/// Anything that is not a short alphanumeric run falls back to `bin` so the
/// generated object path stays inside `entries/`.
pub fn file_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty()
                && ext.len() <= 16
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext
        }
        _ => "bin",
    }
}

/// Store an uploaded file under a fresh `entries/<uuid>.<ext>` path
pub async fn upload_to_storage(
    storage: &dyn MediaStorage,
    bucket: &str,
    file: &UploadedFile,
) -> Result<StoredObject> {
    let path = format!("entries/{}.{}", Uuid::new_v4(), file_extension(&file.file_name));
    storage.put(bucket, &path, &file.data).await?;

    tracing::info!(bucket, path = %path, bytes = file.data.len(), "Stored media object");

    Ok(StoredObject {
        public_url: storage.public_url(bucket, &path),
        path,
    })
}
