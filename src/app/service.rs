//! Bounded query surface for outer layers (CLI, a future API).
//!
//! Every call either completes within its budget or fails with
//! [`SeedwatchError::Timeout`], so an empty list always means "nothing
//! available" and never "the store did not answer".

use std::sync::Arc;
use std::time::Duration;

use crate::app::{Result, SeedwatchError};
use crate::domain::Item;
use crate::reconciler::ReconcileReport;
use crate::scheduler::Scheduler;
use crate::store::{self, Store, StoreCounts};

#[derive(Debug, Clone)]
pub struct QueryTimeouts {
    pub list: Duration,
    pub cleanup: Duration,
    pub scan: Duration,
}

impl Default for QueryTimeouts {
    fn default() -> Self {
        Self {
            list: Duration::from_secs(5),
            cleanup: Duration::from_secs(30),
            scan: Duration::from_secs(900),
        }
    }
}

pub struct QueryService {
    store: Arc<dyn Store>,
    scheduler: Option<Arc<Scheduler>>,
    timeouts: QueryTimeouts,
}

impl QueryService {
    pub fn new(store: Arc<dyn Store>, scheduler: Arc<Scheduler>, timeouts: QueryTimeouts) -> Self {
        Self {
            store,
            scheduler: Some(scheduler),
            timeouts,
        }
    }

    /// Store-only service; `trigger_scan` is rejected.
    pub fn read_only(store: Arc<dyn Store>, timeouts: QueryTimeouts) -> Self {
        Self {
            store,
            scheduler: None,
            timeouts,
        }
    }

    /// Available items, most recently found first.
    pub async fn list_available(&self, limit: usize) -> Result<Vec<Item>> {
        self.blocking("list_available", self.timeouts.list, move |store| {
            store.list_available(limit)
        })
        .await
    }

    /// Every tracked item, available or not.
    pub async fn list_all(&self) -> Result<Vec<Item>> {
        self.blocking("list_all", self.timeouts.list, |store| store.all_items())
            .await
    }

    pub async fn counts(&self) -> Result<StoreCounts> {
        self.blocking("counts", self.timeouts.list, |store| store.counts())
            .await
    }

    /// Run a manual pass. On timeout the pass keeps running in the background.
    pub async fn trigger_scan(&self, max_pages: u32) -> Result<ReconcileReport> {
        let scheduler = self.scheduler.as_ref().ok_or_else(|| {
            SeedwatchError::Config("no listing back-end configured".to_string())
        })?;
        let after = self.timeouts.scan;
        tokio::time::timeout(after, scheduler.run_now(max_pages))
            .await
            .map_err(|_| SeedwatchError::Timeout {
                operation: "trigger_scan",
                after,
            })?
    }

    /// Sweep items unseen for `hour_threshold` hours. Returns how many were flipped.
    pub async fn run_cleanup(&self, hour_threshold: i64) -> Result<usize> {
        self.blocking("run_cleanup", self.timeouts.cleanup, move |store| {
            store.cleanup_stale(hour_threshold)
        })
        .await
    }

    async fn blocking<T, F>(&self, operation: &'static str, after: Duration, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Store) -> Result<T> + Send + 'static,
    {
        tokio::time::timeout(after, store::run_blocking(&self.store, f))
            .await
            .map_err(|_| SeedwatchError::Timeout { operation, after })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemKey, TargetSet};
    use crate::notifier::Notifier;
    use crate::reconciler::Reconciler;
    use crate::scanner::{ScanSettings, Scanner};
    use crate::source::testing::{listing, StaticResolver, StaticSource};
    use crate::store::{SqliteStore, UpsertOutcome};
    use chrono::{DateTime, Utc};

    /// Delegates to SQLite but stalls every list call.
    struct SlowStore {
        inner: SqliteStore,
        stall: Duration,
    }

    impl Store for SlowStore {
        fn upsert_item(&self, item: &Item) -> Result<UpsertOutcome> {
            self.inner.upsert_item(item)
        }
        fn mark_unavailable(&self, key: &ItemKey) -> Result<bool> {
            self.inner.mark_unavailable(key)
        }
        fn mark_stale_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
            self.inner.mark_stale_before(cutoff)
        }
        fn get_item(&self, key: &ItemKey) -> Result<Option<Item>> {
            self.inner.get_item(key)
        }
        fn list_available(&self, limit: usize) -> Result<Vec<Item>> {
            std::thread::sleep(self.stall);
            self.inner.list_available(limit)
        }
        fn available_items(&self) -> Result<Vec<Item>> {
            self.inner.available_items()
        }
        fn all_items(&self) -> Result<Vec<Item>> {
            self.inner.all_items()
        }
        fn counts(&self) -> Result<StoreCounts> {
            self.inner.counts()
        }
    }

    struct Fixture {
        source: Arc<StaticSource>,
        service: QueryService,
    }

    fn fixture(store: Arc<dyn Store>, timeouts: QueryTimeouts) -> Fixture {
        let source = Arc::new(StaticSource::new());
        let resolver = Arc::new(StaticResolver::new());
        source.set_page(1, vec![listing("a", "$50")]);
        resolver.insert("a", 16, 0.012);

        let scanner = Scanner::new(
            source.clone(),
            resolver,
            store.clone(),
            TargetSet::new([16]),
            ScanSettings::default(),
        );
        let reconciler = Arc::new(Reconciler::new(store.clone(), scanner, 24));
        let scheduler = Arc::new(Scheduler::new(reconciler, Arc::new(Notifier::new()), 1));

        Fixture {
            source,
            service: QueryService::new(store, scheduler, timeouts),
        }
    }

    #[tokio::test]
    async fn test_empty_store_lists_nothing() {
        let f = fixture(
            Arc::new(SqliteStore::in_memory().unwrap()),
            QueryTimeouts::default(),
        );
        let items = f.service.list_available(50).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_trigger_scan_then_list() {
        let f = fixture(
            Arc::new(SqliteStore::in_memory().unwrap()),
            QueryTimeouts::default(),
        );

        let report = f.service.trigger_scan(1).await.unwrap();
        assert_eq!(report.added.len(), 1);

        let items = f.service.list_available(50).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].pattern_id, 16);

        let counts = f.service.counts().await.unwrap();
        assert_eq!(counts, StoreCounts { available: 1, total: 1 });
    }

    #[tokio::test]
    async fn test_slow_list_reports_timeout() {
        let store = Arc::new(SlowStore {
            inner: SqliteStore::in_memory().unwrap(),
            stall: Duration::from_millis(300),
        });
        let f = fixture(
            store,
            QueryTimeouts {
                list: Duration::from_millis(30),
                ..Default::default()
            },
        );

        let err = f.service.list_available(50).await.unwrap_err();
        assert!(matches!(
            err,
            SeedwatchError::Timeout {
                operation: "list_available",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_scan_timeout_leaves_pass_running() {
        let f = fixture(
            Arc::new(SqliteStore::in_memory().unwrap()),
            QueryTimeouts {
                scan: Duration::from_millis(30),
                ..Default::default()
            },
        );
        f.source.set_delay(Duration::from_millis(300));

        let err = f.service.trigger_scan(1).await.unwrap_err();
        assert!(matches!(err, SeedwatchError::Timeout { .. }));

        let again = f.service.trigger_scan(1).await.unwrap_err();
        assert!(matches!(again, SeedwatchError::PassInProgress));
        assert_eq!(f.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_read_only_rejects_scan() {
        let service = QueryService::read_only(
            Arc::new(SqliteStore::in_memory().unwrap()),
            QueryTimeouts::default(),
        );
        assert!(matches!(
            service.trigger_scan(1).await,
            Err(SeedwatchError::Config(_))
        ));
        assert!(service.list_available(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_cleanup_counts_flipped_items() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let old = Utc::now() - chrono::Duration::hours(30);
        store
            .upsert_item(&Item::sighted(16, 0.3, "$1", "old", "img", old))
            .unwrap();
        store
            .upsert_item(&Item::sighted(16, 0.4, "$1", "new", "img", Utc::now()))
            .unwrap();
        let f = fixture(store, QueryTimeouts::default());

        assert_eq!(f.service.run_cleanup(24).await.unwrap(), 1);
        assert_eq!(f.service.list_available(50).await.unwrap().len(), 1);
    }
}
