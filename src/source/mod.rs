//! Capability interfaces for reading the marketplace.
//!
//! The reconciliation core only sees [`ListingSource`] and [`DetailResolver`].
//! Two back-ends implement them: headless Chrome ([`crate::scraper`]) and the
//! plain HTTP JSON endpoints ([`http`]).

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::Result;

/// One row of a listing page, before any detail lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListing {
    pub price: String,
    pub image_url: String,
    pub inspect_link: String,
}

impl RawListing {
    pub fn new(
        price: impl Into<String>,
        image_url: impl Into<String>,
        inspect_link: impl Into<String>,
    ) -> Self {
        Self {
            price: price.into(),
            image_url: image_url.into(),
            inspect_link: inspect_link.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub listings: Vec<RawListing>,
    /// Total listings in the category when the source reports it.
    pub total_count: Option<u64>,
}

impl ListingPage {
    pub fn new(listings: Vec<RawListing>) -> Self {
        Self {
            listings,
            total_count: None,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }

    /// The source positively reported that nothing is listed.
    pub fn confirms_empty(&self) -> bool {
        self.total_count == Some(0)
    }
}

/// Attributes resolved from an inspection link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemDetails {
    pub condition_value: f64,
    pub pattern_id: i64,
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch listings for a 1-based page number.
    ///
    /// Fails with `SourceUnavailable` or `ParseFailure`.
    async fn fetch_page(&self, page: u32) -> Result<ListingPage>;
}

#[async_trait]
pub trait DetailResolver: Send + Sync {
    /// Fails with `ResolutionTimeout` or `ResolutionFailure`.
    async fn resolve(&self, inspect_link: &str, timeout: Duration) -> Result<ItemDetails>;
}
