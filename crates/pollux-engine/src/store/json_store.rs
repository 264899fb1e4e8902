//! JSON file-based result store.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use pollux_hal::WorkUnitId;
use rustc_hash::FxHashMap;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{EngineError, EngineResult};
use crate::outcome::ResultEntry;
use crate::store::ResultStore;

/// JSON file-based result store.
///
/// Stores each entry as a separate JSON file under `<base>/results/` and
/// keeps an in-memory cache for reads. An entry is written in full to a
/// hidden temporary file and then hard-linked into place, so `<id>.json`
/// either holds a complete entry or does not exist, and an entry written by
/// an earlier process is never overwritten.
pub struct JsonResultStore {
    /// Base directory for storage.
    base_dir: PathBuf,

    /// In-memory cache of entries.
    cache: RwLock<FxHashMap<WorkUnitId, ResultEntry>>,
}

impl JsonResultStore {
    /// Open (or create) a store at the given path.
    pub async fn new(base_dir: impl AsRef<Path>) -> EngineResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join("results")).await?;

        let store = Self {
            base_dir,
            cache: RwLock::new(FxHashMap::default()),
        };
        store.load_all().await?;

        Ok(store)
    }

    /// Directory holding the store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// All entries, oldest first.
    pub async fn list(&self) -> Vec<ResultEntry> {
        let cache = self.cache.read().await;
        let mut entries: Vec<_> = cache.values().cloned().collect();
        entries.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
        entries
    }

    fn entry_path(&self, id: &WorkUnitId) -> EngineResult<PathBuf> {
        let raw = id.as_str();
        if raw.is_empty()
            || raw == "."
            || raw == ".."
            || raw.contains(['/', '\\', '\0'])
        {
            return Err(EngineError::InvalidWorkUnit(format!(
                "work unit id '{raw}' cannot be used as a file name"
            )));
        }
        Ok(self.base_dir.join("results").join(format!("{raw}.json")))
    }

    fn temp_path(&self, id: &WorkUnitId) -> PathBuf {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        self.base_dir
            .join("results")
            .join(format!(".{}.{}.{n}.tmp", id.as_str(), std::process::id()))
    }

    async fn load_all(&self) -> EngineResult<()> {
        let results_dir = self.base_dir.join("results");
        let mut cache = self.cache.write().await;

        let mut entries = fs::read_dir(&results_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && path.extension().is_some_and(|ext| ext == "json") {
                match fs::read_to_string(&path).await {
                    Ok(content) => match serde_json::from_str::<ResultEntry>(&content) {
                        Ok(result) => {
                            cache.insert(result.work_unit_id.clone(), result);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse result file {:?}: {}", path, e);
                        }
                    },
                    Err(e) => {
                        tracing::warn!("Failed to read result file {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ResultStore for JsonResultStore {
    async fn put(&self, entry: ResultEntry) -> EngineResult<()> {
        let path = self.entry_path(&entry.work_unit_id)?;
        let json = serde_json::to_string_pretty(&entry)?;

        // Held across the write so concurrent puts for one id serialize.
        let mut cache = self.cache.write().await;
        if cache.contains_key(&entry.work_unit_id) {
            return Err(EngineError::DuplicateResult(entry.work_unit_id));
        }

        let tmp = self.temp_path(&entry.work_unit_id);
        let linked = match write_synced(&tmp, json.as_bytes()).await {
            Ok(()) => fs::hard_link(&tmp, &path).await,
            Err(e) => Err(e),
        };
        match fs::remove_file(&tmp).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                tracing::warn!("Failed to remove temporary file {:?}: {}", tmp, e);
            }
            _ => {}
        }
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(EngineError::DuplicateResult(entry.work_unit_id));
            }
            Err(e) => return Err(EngineError::Io(e)),
        }

        cache.insert(entry.work_unit_id.clone(), entry);
        Ok(())
    }

    async fn get(&self, id: &WorkUnitId) -> EngineResult<ResultEntry> {
        let cache = self.cache.read().await;
        if let Some(entry) = cache.get(id) {
            return Ok(entry.clone());
        }
        drop(cache);

        // Written by another process since we loaded.
        let path = self.entry_path(id)?;
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let entry: ResultEntry = serde_json::from_str(&content).map_err(|e| {
                    EngineError::Persistence(format!(
                        "result file {} is unreadable: {e}",
                        path.display()
                    ))
                })?;
                let mut cache = self.cache.write().await;
                cache.insert(entry.work_unit_id.clone(), entry.clone());
                Ok(entry)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::NotFound(id.clone()))
            }
            Err(e) => Err(EngineError::Io(e)),
        }
    }

    async fn contains(&self, id: &WorkUnitId) -> EngineResult<bool> {
        match self.get(id).await {
            Ok(_) => Ok(true),
            Err(EngineError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
