//! Turns a scan into `added` / `removed` deltas against the stored snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::app::Result;
use crate::domain::{Item, ItemKey};
use crate::scanner::{ScanOutcome, Scanner};
use crate::store::{self, Store};

/// Default age after which an unseen item is swept to unavailable.
pub const DEFAULT_STALE_THRESHOLD_HOURS: i64 = 24;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    pub pages_loaded: u32,
    pub pages_failed: u32,
    pub listings_seen: usize,
    pub resolved: usize,
    pub resolve_failures: usize,
    pub matches: usize,
}

impl From<&ScanOutcome> for ScanSummary {
    fn from(outcome: &ScanOutcome) -> Self {
        Self {
            pages_loaded: outcome.pages_loaded,
            pages_failed: outcome.pages_failed,
            listings_seen: outcome.listings_seen,
            resolved: outcome.resolved,
            resolve_failures: outcome.resolve_failures,
            matches: outcome.items.len(),
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<Item>,
    pub removed: Vec<Item>,
    /// Items flipped by the staleness sweep. These produce no events.
    pub stale_marked: usize,
    /// The scan was inconclusive and deltas were withheld.
    pub suppressed: bool,
    pub scan: ScanSummary,
}

impl ReconcileReport {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

pub struct Reconciler {
    store: Arc<dyn Store>,
    scanner: Scanner,
    stale_threshold_hours: i64,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, scanner: Scanner, stale_threshold_hours: i64) -> Self {
        Self {
            store,
            scanner,
            stale_threshold_hours,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Run one pass. Fails only when the snapshot or sweep cannot reach the store,
    /// or a store task cannot be scheduled.
    pub async fn reconcile(&self, max_pages: u32) -> Result<ReconcileReport> {
        let mut working: HashMap<ItemKey, Item> =
            store::run_blocking(&self.store, |s| s.available_items())
                .await?
                .into_iter()
                .map(|item| (item.key(), item))
                .collect();
        let before = working.len();

        let outcome = self.scanner.scan(max_pages).await;

        let mut report = ReconcileReport {
            scan: ScanSummary::from(&outcome),
            ..Default::default()
        };

        if outcome.is_conclusive() {
            let mut seen: HashSet<ItemKey> = HashSet::new();
            for item in outcome.items {
                let key = item.key();
                if !seen.insert(key) {
                    continue;
                }
                if working.remove(&key).is_none() {
                    report.added.push(item);
                }
            }

            let mut gone: Vec<Item> = working.into_values().collect();
            gone.sort_by(|a, b| a.first_seen.cmp(&b.first_seen));
            report.removed = store::run_blocking(&self.store, move |s| {
                Ok(gone.into_iter().filter_map(|item| mark_removed(s, item)).collect())
            })
            .await?;
        } else {
            report.suppressed = true;
            warn!(
                pages_loaded = outcome.pages_loaded,
                pages_failed = outcome.pages_failed,
                resolved = outcome.resolved,
                resolve_failures = outcome.resolve_failures,
                previously_available = before,
                "No matches and no empty-category confirmation, treating as an outage"
            );
        }

        let hours = self.stale_threshold_hours;
        report.stale_marked =
            store::run_blocking(&self.store, move |s| s.cleanup_stale(hours)).await?;

        info!(
            added = report.added.len(),
            removed = report.removed.len(),
            stale = report.stale_marked,
            suppressed = report.suppressed,
            "Reconciliation pass complete"
        );

        Ok(report)
    }
}

fn mark_removed(store: &dyn Store, mut item: Item) -> Option<Item> {
    match store.mark_unavailable(&item.key()) {
        Ok(_) => {
            item.is_available = false;
            Some(item)
        }
        Err(e) => {
            warn!(
                pattern_id = item.pattern_id,
                condition_value = item.condition_value,
                "Failed to mark item unavailable: {}",
                e
            );
            None
        }
    }
}
