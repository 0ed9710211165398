//! Local disk storage backend
//!
//! Objects live at `{root}/{bucket}/{path}`; the same tree is served
//! statically under the public base URL.

use super::MediaStorage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(root: PathBuf, public_base_url: &str) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("Invalid object path: {}/{}", bucket, path);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStorage for LocalStorage {
    async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<()> {
        let target = self.object_path(bucket, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create storage directory: {:?}", parent))?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .with_context(|| format!("Failed to create object {}/{}", bucket, path))?;
        file.write_all(data)
            .await
            .with_context(|| format!("Failed to write object {}/{}", bucket, path))?;
        file.flush().await?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<()> {
        let target = self.object_path(bucket, path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete object {}/{}", bucket, path)),
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, path)
    }
}
