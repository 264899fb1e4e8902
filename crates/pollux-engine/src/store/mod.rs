//! Write-once storage of job outcomes.

mod json_store;
mod memory;

pub use json_store::JsonResultStore;
pub use memory::MemoryResultStore;

use async_trait::async_trait;
use pollux_hal::WorkUnitId;

use crate::error::EngineResult;
use crate::outcome::ResultEntry;

/// Keyed, write-once store of result entries.
///
/// Implementations must be safe under concurrent access. An entry is never
/// mutated after `put`, and a `put` happens-before any `get` that observes
/// it.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Record an entry.
    ///
    /// Fails with `DuplicateResult` if an entry already exists for the work
    /// unit; the existing entry is left unchanged.
    async fn put(&self, entry: ResultEntry) -> EngineResult<()>;

    /// Fetch the entry for a work unit, failing with `NotFound` if absent.
    async fn get(&self, id: &WorkUnitId) -> EngineResult<ResultEntry>;

    /// Check whether an entry exists for a work unit.
    async fn contains(&self, id: &WorkUnitId) -> EngineResult<bool>;
}
