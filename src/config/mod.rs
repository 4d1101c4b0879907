//! Configuration management for seedwatch.
//!
//! Configuration is read from `~/.config/seedwatch/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.
//! `MAX_PAGES_TO_SCAN` and `SEEDWATCH_DB` override the file.

use crate::domain::{TargetSet, DEFAULT_TARGET_SEEDS};
use crate::scanner::ScanSettings;
use crate::scheduler::parse_interval;
use crate::scraper::ScraperConfig;
use crate::source::http::HttpSourceConfig;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MARKET_URL: &str = "https://steamcommunity.com/market/listings/730/Desert%20Eagle%20%7C%20Heat%20Treated%20(Minimal%20Wear)";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub timeouts: TimeoutConfig,
    pub scraper: ScraperConfig,
    pub http: HttpSourceConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Headless Chrome rendering the market pages
    Chrome,
    /// Plain HTTP against the JSON render endpoints
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub market_url: String,
    pub target_seeds: Vec<i64>,
    pub max_pages: u32,
    pub interval: String,
    pub stale_threshold_hours: i64,
    pub list_limit: usize,
    pub backend: Backend,
    pub resolve_concurrency: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            market_url: DEFAULT_MARKET_URL.to_string(),
            target_seeds: DEFAULT_TARGET_SEEDS.to_vec(),
            max_pages: 10,
            interval: "5m".to_string(),
            stale_threshold_hours: 24,
            list_limit: 50,
            backend: Backend::Chrome,
            resolve_concurrency: 3,
        }
    }
}

impl MonitorConfig {
    pub fn targets(&self) -> TargetSet {
        TargetSet::new(self.target_seeds.iter().copied())
    }

    pub fn interval(&self) -> Result<Duration, ConfigError> {
        parse_interval(&self.interval).map_err(ConfigError::Invalid)
    }
}

/// Bounds on every suspension point, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub page_secs: u64,
    pub resolve_secs: u64,
    pub list_secs: u64,
    pub cleanup_secs: u64,
    pub scan_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            page_secs: 20,
            resolve_secs: 10,
            list_secs: 5,
            cleanup_secs: 30,
            scan_secs: 900,
        }
    }
}

impl TimeoutConfig {
    pub fn page(&self) -> Duration {
        Duration::from_secs(self.page_secs)
    }

    pub fn resolve(&self) -> Duration {
        Duration::from_secs(self.resolve_secs)
    }

    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list_secs)
    }

    pub fn cleanup(&self) -> Duration {
        Duration::from_secs(self.cleanup_secs)
    }

    pub fn scan(&self) -> Duration {
        Duration::from_secs(self.scan_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Defaults to `<data_dir>/seedwatch/seedwatch.db`
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from an explicit path, creating a commented default if it is missing.
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(pages) = lookup("MAX_PAGES_TO_SCAN") {
            self.monitor.max_pages = pages.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("MAX_PAGES_TO_SCAN is not a page count: {pages}"))
            })?;
        }
        if let Some(path) = lookup("SEEDWATCH_DB") {
            if !path.is_empty() {
                self.database.path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    /// Get the default config file path: `~/.config/seedwatch/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("seedwatch").join("config.toml"))
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            page_timeout: self.timeouts.page(),
            resolve_timeout: self.timeouts.resolve(),
            resolve_concurrency: self.monitor.resolve_concurrency,
        }
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let default_config = Self::default_config_content();

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(default_config.as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        format!(
            r##"# seedwatch configuration
#
# Intervals accept "30s", "5m", "1h", "1d" or a number of seconds.
# MAX_PAGES_TO_SCAN and SEEDWATCH_DB in the environment override this file.

[monitor]
# Market listing page to watch
market_url = "{market_url}"

# Pattern ids (paint seeds) worth tracking
target_seeds = [{seeds}]

# Listing pages walked per scheduled pass
max_pages = 10

# Time between scheduled passes
interval = "5m"

# Available items not seen for this many hours are marked unavailable
stale_threshold_hours = 24

# Rows returned by `seedwatch list`
list_limit = 50

# "chrome" renders the market in a headless browser, "http" uses the JSON endpoints
backend = "chrome"

# Listings resolved in parallel within one page
resolve_concurrency = 3

[timeouts]
# Single listing page fetch
page_secs = 20

# Single float/seed lookup
resolve_secs = 10

# Query surface bounds
list_secs = 5
cleanup_secs = 30
scan_secs = 900

[scraper]
# Run browser in headless mode (no visible window)
headless = true

# How long to wait for listing rows or detail fields to appear (seconds)
selector_timeout_secs = 10

# Wait time after page load for dynamic content (milliseconds)
wait_after_load_ms = 1000

# Maximum concurrent browser pages
max_concurrency = 3

# CSS selectors on the market page
listing_row_selector = ".market_listing_row"
price_selector = ".market_listing_price"
image_selector = ".market_listing_item_img"
inspect_selector = ".item_market_action_button"
total_selector = "#searchResults_total"

# Detail lookup page; {{inspect}} is replaced by the encoded inspect link
detail_url_template = "https://csfloat.com/?url={{inspect}}"
condition_selector = ".float-value"
pattern_selector = ".paint-seed"

[http]
# Listings per render request
page_size = 10

# Market currency id (1 = USD)
currency = 1
price_prefix = "$"

float_api_url = "https://api.csfloat.com/"
request_timeout_secs = 15

[database]
# path = "/var/lib/seedwatch/seedwatch.db"
"##,
            market_url = DEFAULT_MARKET_URL,
            seeds = DEFAULT_TARGET_SEEDS
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
