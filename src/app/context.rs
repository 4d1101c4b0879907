use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::app::error::{Result, SeedwatchError};
use crate::app::service::{QueryService, QueryTimeouts};
use crate::config::{Backend, Config};
use crate::notifier::{BroadcastSink, LogSink, Notifier};
use crate::reconciler::Reconciler;
use crate::scanner::Scanner;
use crate::scheduler::Scheduler;
use crate::scraper::{ChromeDetailResolver, ChromeListingSource, ChromeSession};
use crate::source::http::{HttpDetailResolver, HttpListingSource};
use crate::source::{DetailResolver, ListingSource};
use crate::store::sqlite::SqliteStore;
use crate::store::Store;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<Notifier>,
    pub events: Arc<BroadcastSink>,
    /// Absent when opened without a listing back-end.
    pub scheduler: Option<Arc<Scheduler>>,
    pub query: QueryService,
}

impl AppContext {
    /// Open the store and launch the configured back-end.
    pub async fn new(config: Config) -> Result<Self> {
        let store = Self::open_store(&config)?;
        let (source, resolver) = Self::backend(&config).await?;
        Ok(Self::with_parts(config, store, source, resolver))
    }

    /// Store and query surface only, for commands that never scan.
    pub fn read_only(config: Config) -> Result<Self> {
        let store = Self::open_store(&config)?;
        let notifier = Arc::new(Notifier::new());
        let events = Arc::new(BroadcastSink::new());
        let query = QueryService::read_only(store.clone(), Self::query_timeouts(&config));

        Ok(Self {
            config,
            store,
            notifier,
            events,
            scheduler: None,
            query,
        })
    }

    /// Wire everything around already-built collaborators.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn Store>,
        source: Arc<dyn ListingSource>,
        resolver: Arc<dyn DetailResolver>,
    ) -> Self {
        let scanner = Scanner::new(
            source,
            resolver,
            store.clone(),
            config.monitor.targets(),
            config.scan_settings(),
        );
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            scanner,
            config.monitor.stale_threshold_hours,
        ));

        let notifier = Arc::new(Notifier::new());
        let events = Arc::new(BroadcastSink::new());
        notifier.register(events.clone());
        notifier.register(Arc::new(LogSink));

        let scheduler = Arc::new(Scheduler::new(
            reconciler,
            notifier.clone(),
            config.monitor.max_pages,
        ));

        let query = QueryService::new(
            store.clone(),
            scheduler.clone(),
            Self::query_timeouts(&config),
        );

        Self {
            config,
            store,
            notifier,
            events,
            scheduler: Some(scheduler),
            query,
        }
    }

    fn query_timeouts(config: &Config) -> QueryTimeouts {
        QueryTimeouts {
            list: config.timeouts.list(),
            cleanup: config.timeouts.cleanup(),
            scan: config.timeouts.scan(),
        }
    }

    fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
        let db_path = match config.database.path.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %db_path.display(), "Opening database");
        Ok(Arc::new(SqliteStore::new(&db_path)?))
    }

    async fn backend(
        config: &Config,
    ) -> Result<(Arc<dyn ListingSource>, Arc<dyn DetailResolver>)> {
        let market_url = config.monitor.market_url.as_str();
        let source: Arc<dyn ListingSource>;
        let resolver: Arc<dyn DetailResolver>;

        match config.monitor.backend {
            Backend::Chrome => {
                info!("Launching headless browser");
                let session = ChromeSession::launch(config.scraper.clone()).await?;
                source = Arc::new(ChromeListingSource::new(session.clone(), market_url));
                resolver = Arc::new(ChromeDetailResolver::new(session));
            }
            Backend::Http => {
                source = Arc::new(HttpListingSource::new(market_url, config.http.clone())?);
                resolver = Arc::new(HttpDetailResolver::new(&config.http)?);
            }
        }

        Ok((source, resolver))
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| SeedwatchError::Config("Could not find data directory".into()))?;
        let seedwatch_dir = data_dir.join("seedwatch");
        std::fs::create_dir_all(&seedwatch_dir)?;
        Ok(seedwatch_dir.join("seedwatch.db"))
    }
}
