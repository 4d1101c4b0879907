use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the headless-Chrome back-end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// How long to wait for a required selector to appear, in seconds (default: 10)
    pub selector_timeout_secs: u64,

    /// Wait time after page load for dynamic content in milliseconds (default: 1000)
    pub wait_after_load_ms: u64,

    /// Maximum concurrent browser pages (default: 3)
    pub max_concurrency: usize,

    /// User agent string to use
    pub user_agent: Option<String>,

    /// One element per listing on the market page
    pub listing_row_selector: String,

    /// Price element inside a listing row
    pub price_selector: String,

    /// `<img>` inside a listing row
    pub image_selector: String,

    /// Anchor inside a listing row whose href is the inspect link
    pub inspect_selector: String,

    /// Element holding the total listing count for the item
    pub total_selector: String,

    /// Detail lookup page; `{inspect}` is replaced by the encoded inspect link
    pub detail_url_template: String,

    /// Element holding the float (wear) value on the detail page
    pub condition_selector: String,

    /// Element holding the paint seed on the detail page
    pub pattern_selector: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            selector_timeout_secs: 10,
            wait_after_load_ms: 1000,
            max_concurrency: 3,
            user_agent: Some(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            listing_row_selector: ".market_listing_row".to_string(),
            price_selector: ".market_listing_price".to_string(),
            image_selector: ".market_listing_item_img".to_string(),
            inspect_selector: ".item_market_action_button".to_string(),
            total_selector: "#searchResults_total".to_string(),
            detail_url_template: "https://csfloat.com/?url={inspect}".to_string(),
            condition_selector: ".float-value".to_string(),
            pattern_selector: ".paint-seed".to_string(),
        }
    }
}

impl ScraperConfig {
    /// Get the selector wait as a Duration
    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }

    /// Get the wait time after load as a Duration
    pub fn wait_after_load(&self) -> Duration {
        Duration::from_millis(self.wait_after_load_ms)
    }

    pub fn detail_url(&self, inspect_link: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(inspect_link.as_bytes()).collect();
        self.detail_url_template.replace("{inspect}", &encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ScraperConfig::default();
        assert!(config.headless);
        assert_eq!(config.selector_timeout_secs, 10);
        assert_eq!(config.wait_after_load_ms, 1000);
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.listing_row_selector, ".market_listing_row");
        assert!(config.detail_url_template.contains("{inspect}"));
    }

    #[test]
    fn test_durations() {
        let config = ScraperConfig::default();
        assert_eq!(config.selector_timeout(), Duration::from_secs(10));
        assert_eq!(config.wait_after_load(), Duration::from_millis(1000));
    }

    #[test]
    fn test_detail_url_encodes_inspect_link() {
        let config = ScraperConfig::default();
        let url = config.detail_url("steam://rungame/730/1/+csgo_econ_action_preview%20M1A2D3");
        assert!(url.starts_with("https://csfloat.com/?url=steam%3A%2F%2Frungame"));
        assert!(!url.contains("{inspect}"));
        assert!(url.contains("%2520M1A2D3"));
    }
}
