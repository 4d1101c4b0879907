//! # seedwatch
//!
//! Watches a marketplace category for listings whose pattern id is on a
//! fixed allow-list, keeps a durable record of them, and reports when they
//! appear or disappear.
//!
//! ## Architecture
//!
//! ```text
//! ListingSource ─┐
//!                ├→ Scanner → Store ← Reconciler → Notifier → EventSink
//! DetailResolver ┘                      ↑
//!                                   Scheduler
//! ```
//!
//! - [`scanner`]: walks listing pages and resolves each listing
//! - [`reconciler`]: diffs a scan against the stored snapshot
//! - [`notifier`]: fire-and-forget fan-out of `added` / `removed` events
//! - [`scheduler`]: fixed-period passes that never overlap
//! - [`store`]: SQLite persistence layer
//!
//! ## Quick Start
//!
//! ```bash
//! # Watch the market, printing events as JSON lines
//! seedwatch run --interval 5m
//!
//! # One manual pass over three pages
//! seedwatch scan --pages 3
//!
//! # Show what is currently listed
//! seedwatch list
//! ```

/// Application context, query surface and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, back-end, scanner, reconciler, notifier and scheduler.
pub mod app;

/// Configuration management.
///
/// Loads from `~/.config/seedwatch/config.toml`, supporting:
/// - Market URL and target pattern ids
/// - Pass interval, page count and timeouts
/// - Chrome and HTTP back-end settings
pub mod config;

/// Command-line interface using clap.
///
/// - `run` - Scheduler until Ctrl-C
/// - `scan` - One manual pass
/// - `list [--all]` - Tracked items
/// - `cleanup` - Staleness sweep
/// - `targets` - Watched pattern ids
pub mod cli;

/// Core domain models.
///
/// - [`Item`](domain::Item): A tracked listing keyed by pattern id and condition value
/// - [`TargetSet`](domain::TargetSet): Pattern ids worth tracking
/// - [`MarketEvent`](domain::MarketEvent): An `added` / `removed` delta
pub mod domain;

pub mod notifier;

pub mod reconciler;

pub mod scanner;

pub mod scheduler;

/// Headless-Chrome back-end via chromiumoxide.
pub mod scraper;

/// Listing source and detail resolver interfaces, plus the HTTP back-end.
pub mod source;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
