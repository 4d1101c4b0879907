pub mod sqlite;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::app::{Result, SeedwatchError};
use crate::domain::{Item, ItemKey};

pub use sqlite::SqliteStore;

/// Number of available items returned to display paths by default.
pub const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub available: usize,
    pub total: usize,
}

pub trait Store: Send + Sync {
    // Writes
    fn upsert_item(&self, item: &Item) -> Result<UpsertOutcome>;
    fn mark_unavailable(&self, key: &ItemKey) -> Result<bool>;
    fn mark_stale_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    // Reads
    fn get_item(&self, key: &ItemKey) -> Result<Option<Item>>;
    fn list_available(&self, limit: usize) -> Result<Vec<Item>>;
    fn available_items(&self) -> Result<Vec<Item>>;
    fn all_items(&self) -> Result<Vec<Item>>;
    fn counts(&self) -> Result<StoreCounts>;

    /// Upsert a batch, logging and dropping items that fail.
    ///
    /// Returns the items that were persisted, in input order.
    fn upsert_items(&self, items: Vec<Item>) -> Vec<Item> {
        items
            .into_iter()
            .filter(|item| match self.upsert_item(item) {
                Ok(_) => true,
                Err(e) => {
                    warn!(
                        pattern_id = item.pattern_id,
                        condition_value = item.condition_value,
                        "Failed to persist item: {}",
                        e
                    );
                    false
                }
            })
            .collect()
    }

    /// Flip every available item not seen within `threshold_hours` to unavailable.
    fn cleanup_stale(&self, threshold_hours: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::hours(threshold_hours.max(0));
        self.mark_stale_before(cutoff)
    }
}

/// Run `f` against the store on tokio's blocking pool.
///
/// rusqlite calls block, so async callers go through here instead of
/// touching the store from a runtime worker.
pub async fn run_blocking<T, F>(store: &Arc<dyn Store>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Store) -> Result<T> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| SeedwatchError::Other(format!("store task failed: {e}")))?
}
