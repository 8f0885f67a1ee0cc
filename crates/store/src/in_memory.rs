//! In-memory backend: useful for testing and short-lived bots.

use async_trait::async_trait;
use glyphsmith_core::error::StoreError;
use glyphsmith_core::outline::{OutlineAsset, OutlineRef, OutlineStore, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

struct StoredOutline {
    owner: SessionId,
    asset: Arc<OutlineAsset>,
}

/// An outline store that keeps every asset in a HashMap.
pub struct InMemoryOutlineStore {
    entries: Arc<RwLock<HashMap<OutlineRef, StoredOutline>>>,
}

impl InMemoryOutlineStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of assets held for one owner.
    pub async fn count_for(&self, owner: &SessionId) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| &e.owner == owner)
            .count()
    }
}

impl Default for InMemoryOutlineStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutlineStore for InMemoryOutlineStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, owner: &SessionId, asset: OutlineAsset) -> Result<OutlineRef, StoreError> {
        let outline = OutlineRef::new();
        self.entries.write().await.insert(
            outline,
            StoredOutline {
                owner: owner.clone(),
                asset: Arc::new(asset),
            },
        );
        Ok(outline)
    }

    async fn get(&self, outline: &OutlineRef) -> Result<Option<Arc<OutlineAsset>>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .get(outline)
            .map(|e| Arc::clone(&e.asset)))
    }

    async fn discard(&self, outline: &OutlineRef) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(outline).is_some())
    }

    async fn purge_owner(&self, owner: &SessionId) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        let len_before = entries.len();
        entries.retain(|_, e| &e.owner != owner);
        Ok(len_before - entries.len())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().await.len())
    }
}
