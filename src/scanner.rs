//! Walks listing pages, resolves each listing and keeps the ones whose
//! pattern id is on the target list.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::app::{Result, SeedwatchError};
use crate::domain::{Item, TargetSet};
use crate::source::{DetailResolver, ItemDetails, ListingSource, RawListing};
use crate::store::{self, Store};

#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Hard limit on a single listing-page fetch
    pub page_timeout: Duration,
    /// Limit handed to the resolver for each inspect link
    pub resolve_timeout: Duration,
    /// Listings resolved concurrently within one page
    pub resolve_concurrency: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(20),
            resolve_timeout: Duration::from_secs(10),
            resolve_concurrency: 3,
        }
    }
}

/// Everything one scan found, plus enough bookkeeping to judge whether the
/// result can be trusted.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Persisted matches in page order, then discovery order. Not deduplicated.
    pub items: Vec<Item>,
    pub pages_loaded: u32,
    pub pages_failed: u32,
    pub listings_seen: usize,
    pub resolved: usize,
    pub resolve_failures: usize,
    pub persisted: usize,
    /// A page reported that the category has no listings at all.
    pub confirmed_empty: bool,
}

impl ScanOutcome {
    /// Whether the scan observed the market well enough to infer removals.
    ///
    /// A scan with no matches only counts when the source confirmed the
    /// category is empty. Resolving non-target listings is not enough.
    pub fn is_conclusive(&self) -> bool {
        !self.items.is_empty() || self.confirmed_empty
    }
}

pub struct Scanner {
    source: Arc<dyn ListingSource>,
    resolver: Arc<dyn DetailResolver>,
    store: Arc<dyn Store>,
    targets: TargetSet,
    settings: ScanSettings,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn ListingSource>,
        resolver: Arc<dyn DetailResolver>,
        store: Arc<dyn Store>,
        targets: TargetSet,
        settings: ScanSettings,
    ) -> Self {
        Self {
            source,
            resolver,
            store,
            targets,
            settings,
        }
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    /// Scan pages `1..=max_pages`, persisting matches page by page.
    pub async fn scan(&self, max_pages: u32) -> ScanOutcome {
        let max_pages = max_pages.max(1);
        let mut outcome = ScanOutcome::default();

        for page in 1..=max_pages {
            info!(page, max_pages, "Scanning page {}...", page);

            let listing_page = match self.fetch_page(page).await {
                Ok(p) => p,
                Err(e) => {
                    outcome.pages_failed += 1;
                    if e.is_transient() {
                        warn!(page, "Error scanning page {}: {}", page, e);
                    } else {
                        error!(page, "Unexpected error on page {}: {}", page, e);
                    }
                    continue;
                }
            };

            outcome.pages_loaded += 1;
            if listing_page.confirms_empty() {
                outcome.confirmed_empty = true;
            }

            let listings: Vec<RawListing> = listing_page
                .listings
                .into_iter()
                .filter(|l| !l.inspect_link.is_empty())
                .collect();
            outcome.listings_seen += listings.len();

            let page_items = self.resolve_page(page, listings, &mut outcome).await;
            if page_items.is_empty() {
                continue;
            }

            let found = page_items.len();
            let persisted = self.persist(page, page_items).await;
            info!(
                page,
                matches = found,
                persisted = persisted.len(),
                "Found {} matching items on page {}",
                found,
                page
            );

            outcome.persisted += persisted.len();
            outcome.items.extend(persisted);
        }

        info!(
            pages_loaded = outcome.pages_loaded,
            pages_failed = outcome.pages_failed,
            listings = outcome.listings_seen,
            resolved = outcome.resolved,
            matches = outcome.items.len(),
            "Scan finished"
        );

        outcome
    }

    /// Race the source against the page timeout so a hung page cannot stall the pass.
    async fn fetch_page(&self, page: u32) -> Result<crate::source::ListingPage> {
        let after = self.settings.page_timeout;
        tokio::time::timeout(after, self.source.fetch_page(page))
            .await
            .map_err(|_| SeedwatchError::PageTimeout { page, after })?
    }

    /// Upsert one page of matches off the runtime. Only items the store
    /// accepted are returned.
    async fn persist(&self, page: u32, items: Vec<Item>) -> Vec<Item> {
        match store::run_blocking(&self.store, move |s| Ok(s.upsert_items(items))).await {
            Ok(persisted) => persisted,
            Err(e) => {
                error!(page, "Failed to persist page {}: {}", page, e);
                Vec::new()
            }
        }
    }

    async fn resolve_page(
        &self,
        page: u32,
        listings: Vec<RawListing>,
        outcome: &mut ScanOutcome,
    ) -> Vec<Item> {
        let concurrency = self.settings.resolve_concurrency.max(1);

        // `buffered` keeps results in listing order
        let results: Vec<(RawListing, Result<ItemDetails>)> = stream::iter(listings)
            .map(|listing| async move {
                let details = self.resolve(&listing.inspect_link).await;
                (listing, details)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut matches = Vec::new();
        for (listing, details) in results {
            let details = match details {
                Ok(d) => d,
                Err(e) => {
                    outcome.resolve_failures += 1;
                    debug!(page, link = %listing.inspect_link, "Skipping listing: {}", e);
                    continue;
                }
            };
            outcome.resolved += 1;

            if !self.targets.contains(details.pattern_id) {
                continue;
            }

            info!(
                page,
                pattern_id = details.pattern_id,
                condition_value = details.condition_value,
                price = %listing.price,
                "Target pattern found"
            );

            matches.push(Item::sighted(
                details.pattern_id,
                details.condition_value,
                listing.price,
                listing.inspect_link,
                listing.image_url,
                Utc::now(),
            ));
        }

        matches
    }

    async fn resolve(&self, inspect_link: &str) -> Result<ItemDetails> {
        let after = self.settings.resolve_timeout;
        tokio::time::timeout(after, self.resolver.resolve(inspect_link, after))
            .await
            .map_err(|_| SeedwatchError::ResolutionTimeout(after))?
    }
}
