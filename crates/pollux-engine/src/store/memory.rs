//! In-memory result store.

use async_trait::async_trait;
use pollux_hal::WorkUnitId;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use crate::error::{EngineError, EngineResult};
use crate::outcome::ResultEntry;
use crate::store::ResultStore;

/// Result store backed by a hash map behind a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    entries: RwLock<FxHashMap<WorkUnitId, ResultEntry>>,
}

impl MemoryResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, entry: ResultEntry) -> EngineResult<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.work_unit_id) {
            return Err(EngineError::DuplicateResult(entry.work_unit_id));
        }
        entries.insert(entry.work_unit_id.clone(), entry);
        Ok(())
    }

    async fn get(&self, id: &WorkUnitId) -> EngineResult<ResultEntry> {
        self.entries
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    async fn contains(&self, id: &WorkUnitId) -> EngineResult<bool> {
        Ok(self.entries.read().await.contains_key(id))
    }
}
