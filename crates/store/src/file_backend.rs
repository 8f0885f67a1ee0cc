//! File-based outline store: one temp directory per session.
//!
//! Storage location: `<root>/session_<owner>/<uuid>.svg`. The index of
//! references lives in memory; file contents are read back on demand, so a
//! file removed behind the store's back simply resolves to `None`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glyphsmith_core::error::StoreError;
use glyphsmith_core::outline::{OutlineAsset, OutlineFormat, OutlineRef, OutlineStore, SessionId};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct FileEntry {
    owner: SessionId,
    path: PathBuf,
    filename: String,
    format: OutlineFormat,
    received_at: DateTime<Utc>,
}

/// A file-backed outline store.
pub struct FileOutlineStore {
    root: PathBuf,
    index: Arc<RwLock<HashMap<OutlineRef, FileEntry>>>,
}

impl FileOutlineStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: PathBuf) -> Self {
        debug!(root = %root.display(), "File outline store ready");
        Self {
            root,
            index: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one owner's uploads.
    pub fn owner_dir(&self, owner: &SessionId) -> PathBuf {
        let safe: String = owner
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.root.join(format!("session_{safe}"))
    }

    async fn remove_file(path: &Path) -> Result<(), StoreError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Storage(format!(
                "Failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl OutlineStore for FileOutlineStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn put(&self, owner: &SessionId, asset: OutlineAsset) -> Result<OutlineRef, StoreError> {
        let outline = OutlineRef::new();
        let dir = self.owner_dir(owner);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            StoreError::Storage(format!("Failed to create {}: {e}", dir.display()))
        })?;

        let path = dir.join(format!("{outline}.{}", asset.format.extension()));
        tokio::fs::write(&path, &asset.bytes).await.map_err(|e| {
            StoreError::Storage(format!("Failed to write {}: {e}", path.display()))
        })?;

        self.index.write().await.insert(
            outline,
            FileEntry {
                owner: owner.clone(),
                path,
                filename: asset.filename,
                format: asset.format,
                received_at: asset.received_at,
            },
        );
        Ok(outline)
    }

    async fn get(&self, outline: &OutlineRef) -> Result<Option<Arc<OutlineAsset>>, StoreError> {
        let (path, filename, format, received_at) = {
            let index = self.index.read().await;
            let Some(entry) = index.get(outline) else {
                return Ok(None);
            };
            (
                entry.path.clone(),
                entry.filename.clone(),
                entry.format,
                entry.received_at,
            )
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Arc::new(OutlineAsset {
                format,
                filename,
                bytes,
                received_at,
            }))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(outline = %outline, path = %path.display(), "Outline file vanished");
                Ok(None)
            }
            Err(e) => Err(StoreError::Storage(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn discard(&self, outline: &OutlineRef) -> Result<bool, StoreError> {
        let removed = self.index.write().await.remove(outline);
        match removed {
            Some(entry) => {
                Self::remove_file(&entry.path).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Every file is attempted. Entries whose file could not be removed stay
    /// indexed, and the first such error is returned.
    async fn purge_owner(&self, owner: &SessionId) -> Result<usize, StoreError> {
        let owned: Vec<(OutlineRef, PathBuf)> = self
            .index
            .read()
            .await
            .iter()
            .filter(|(_, e)| &e.owner == owner)
            .map(|(r, e)| (*r, e.path.clone()))
            .collect();

        let mut removed = Vec::with_capacity(owned.len());
        let mut first_error = None;
        for (outline, path) in owned {
            match Self::remove_file(&path).await {
                Ok(()) => removed.push(outline),
                Err(e) => {
                    warn!(owner = %owner, outline = %outline, error = %e, "Failed to remove outline file");
                    first_error.get_or_insert(e);
                }
            }
        }

        {
            let mut index = self.index.write().await;
            for outline in &removed {
                index.remove(outline);
            }
        }

        // Only succeeds once the directory is empty.
        let _ = tokio::fs::remove_dir(self.owner_dir(owner)).await;

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed.len()),
        }
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.index.read().await.len())
    }
}
