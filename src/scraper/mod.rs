//! Headless-Chrome back-end for reading the market.
//!
//! # Architecture
//!
//! ```text
//! ChromeSession (one browser) ─┬─ ChromeListingSource  → market page rows
//!                              └─ ChromeDetailResolver → float / seed lookup
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use seedwatch::scraper::{ChromeSession, ChromeListingSource, ChromeDetailResolver, ScraperConfig};
//!
//! let session = ChromeSession::launch(ScraperConfig::default()).await?;
//! let source = ChromeListingSource::new(session.clone(), market_url);
//! let resolver = ChromeDetailResolver::new(session);
//! ```

mod chrome;
mod config;
mod extractor;

pub use chrome::{ChromeDetailResolver, ChromeListingSource, ChromeSession};
pub use config::ScraperConfig;
pub use extractor::PageExtractor;
