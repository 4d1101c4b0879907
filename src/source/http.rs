//! Plain-HTTP back-end: the market's JSON render endpoint for listings and a
//! float-lookup API for item details.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::app::{Result, SeedwatchError};
use crate::source::{DetailResolver, ItemDetails, ListingPage, ListingSource, RawListing};

const IMAGE_BASE_URL: &str = "https://community.cloudflare.steamstatic.com/economy/image/";

/// Settings for the HTTP back-end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSourceConfig {
    /// Listings requested per page (default: 10)
    pub page_size: u32,

    /// Market currency code, 1 = USD (default: 1)
    pub currency: u32,

    /// Prefix used when formatting prices (default: "$")
    pub price_prefix: String,

    /// Float lookup API, queried with `?url=<inspect link>`
    pub float_api_url: String,

    /// Client-level request timeout in seconds (default: 15)
    pub request_timeout_secs: u64,

    pub user_agent: String,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            currency: 1,
            price_prefix: "$".to_string(),
            float_api_url: "https://api.csfloat.com/".to_string(),
            request_timeout_secs: 15,
            user_agent: "seedwatch/0.1.0".to_string(),
        }
    }
}

fn build_client(config: &HttpSourceConfig) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .gzip(true)
        .brotli(true)
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(client)
}

pub struct HttpListingSource {
    client: Client,
    render_url: String,
    config: HttpSourceConfig,
}

impl HttpListingSource {
    pub fn new(market_url: &str, config: HttpSourceConfig) -> Result<Self> {
        let render_url = format!("{}/render/", market_url.trim_end_matches('/'));
        // Fail early on a malformed market URL
        Url::parse(&render_url)?;

        Ok(Self {
            client: build_client(&config)?,
            render_url,
            config,
        })
    }

    pub fn page_url(&self, page: u32) -> Result<Url> {
        // u32 * u32 always fits in u64
        let start = u64::from(page.saturating_sub(1)) * u64::from(self.config.page_size);
        let url = Url::parse_with_params(
            &self.render_url,
            &[
                ("query", String::new()),
                ("start", start.to_string()),
                ("count", self.config.page_size.to_string()),
                ("currency", self.config.currency.to_string()),
                ("format", "json".to_string()),
            ],
        )?;
        Ok(url)
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch_page(&self, page: u32) -> Result<ListingPage> {
        let url = self.page_url(page)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SeedwatchError::SourceUnavailable(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SeedwatchError::SourceUnavailable(
                    "rate limited by market".to_string(),
                ))
            }
            status if !status.is_success() => {
                return Err(SeedwatchError::SourceUnavailable(format!(
                    "market returned HTTP {status}"
                )))
            }
            _ => {}
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SeedwatchError::SourceUnavailable(e.to_string()))?;

        parse_render_page(&body, &self.config.price_prefix)
    }
}

/// Parse the market's render JSON into listings, cheapest first.
pub fn parse_render_page(body: &[u8], price_prefix: &str) -> Result<ListingPage> {
    let root: Value =
        serde_json::from_slice(body).map_err(|e| SeedwatchError::ParseFailure(e.to_string()))?;

    if !root["success"].as_bool().unwrap_or(false) {
        return Err(SeedwatchError::SourceUnavailable(
            "market reported success=false".to_string(),
        ));
    }

    let total_count = root["total_count"].as_u64();

    // An empty result set comes back as `[]` rather than `{}`
    let entries = match &root["listinginfo"] {
        Value::Object(map) => map.values().collect::<Vec<_>>(),
        Value::Array(arr) if arr.is_empty() => Vec::new(),
        Value::Null => Vec::new(),
        other => {
            return Err(SeedwatchError::ParseFailure(format!(
                "unexpected listinginfo shape: {other}"
            )))
        }
    };

    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let listing: RenderListing = match serde_json::from_value(entry.clone()) {
            Ok(l) => l,
            Err(e) => {
                tracing::debug!("Skipping malformed listing entry: {}", e);
                continue;
            }
        };

        let inspect_link = listing
            .asset
            .market_actions
            .iter()
            .find(|a| a.link.contains("%assetid%") || a.link.contains("csgo_econ_action_preview"))
            .map(|a| {
                a.link
                    .replace("%listingid%", &listing.listingid)
                    .replace("%assetid%", &listing.asset.id)
            })
            .unwrap_or_default();

        let image_url = root["assets"][listing.asset.appid.to_string()]
            [listing.asset.contextid.as_str()][listing.asset.id.as_str()]["icon_url"]
            .as_str()
            .map(|icon| format!("{IMAGE_BASE_URL}{icon}"))
            .unwrap_or_default();

        let cents = listing.converted_price.unwrap_or(0) + listing.converted_fee.unwrap_or(0);

        rows.push((
            cents,
            listing.listingid.clone(),
            RawListing {
                price: format_price(cents, price_prefix),
                image_url,
                inspect_link,
            },
        ));
    }

    // listinginfo is an object, so its key order says nothing about the page order
    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    Ok(ListingPage {
        listings: rows.into_iter().map(|(_, _, l)| l).collect(),
        total_count,
    })
}

pub fn format_price(cents: u64, prefix: &str) -> String {
    format!("{}{}.{:02}", prefix, cents / 100, cents % 100)
}

#[derive(Debug, Deserialize)]
struct RenderListing {
    listingid: String,
    #[serde(default)]
    converted_price: Option<u64>,
    #[serde(default)]
    converted_fee: Option<u64>,
    asset: RenderAsset,
}

#[derive(Debug, Deserialize)]
struct RenderAsset {
    id: String,
    appid: u32,
    contextid: String,
    #[serde(default)]
    market_actions: Vec<MarketAction>,
}

#[derive(Debug, Deserialize)]
struct MarketAction {
    link: String,
}

pub struct HttpDetailResolver {
    client: Client,
    api_url: String,
}

impl HttpDetailResolver {
    pub fn new(config: &HttpSourceConfig) -> Result<Self> {
        Url::parse(&config.float_api_url)?;
        Ok(Self {
            client: build_client(config)?,
            api_url: config.float_api_url.clone(),
        })
    }
}

#[async_trait]
impl DetailResolver for HttpDetailResolver {
    async fn resolve(&self, inspect_link: &str, timeout: Duration) -> Result<ItemDetails> {
        let url = Url::parse_with_params(&self.api_url, &[("url", inspect_link)])?;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SeedwatchError::ResolutionTimeout(timeout)
                } else {
                    SeedwatchError::ResolutionFailure(e.to_string())
                }
            })?;

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                SeedwatchError::ResolutionTimeout(timeout)
            } else {
                SeedwatchError::ResolutionFailure(e.to_string())
            }
        })?;

        parse_float_response(&body)
    }
}

/// Parse `{"iteminfo": {"floatvalue": .., "paintseed": ..}}`.
pub fn parse_float_response(body: &[u8]) -> Result<ItemDetails> {
    let root: Value = serde_json::from_slice(body)
        .map_err(|e| SeedwatchError::ResolutionFailure(format!("invalid JSON: {e}")))?;

    if let Some(error) = root["error"].as_str() {
        return Err(SeedwatchError::ResolutionFailure(error.to_string()));
    }

    let info = &root["iteminfo"];
    let condition_value = info["floatvalue"]
        .as_f64()
        .ok_or_else(|| SeedwatchError::ResolutionFailure("missing floatvalue".to_string()))?;
    let pattern_id = info["paintseed"]
        .as_i64()
        .ok_or_else(|| SeedwatchError::ResolutionFailure("missing paintseed".to_string()))?;

    Ok(ItemDetails {
        condition_value,
        pattern_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET_URL: &str = "https://steamcommunity.com/market/listings/730/Desert%20Eagle%20%7C%20Heat%20Treated%20(Minimal%20Wear)";

    fn render_body() -> String {
        r#"{
            "success": true,
            "start": 0,
            "pagesize": 10,
            "total_count": 57,
            "listinginfo": {
                "900": {
                    "listingid": "900",
                    "converted_price": 5000,
                    "converted_fee": 750,
                    "asset": {
                        "currency": 0, "appid": 730, "contextid": "2", "id": "31",
                        "market_actions": [{
                            "link": "steam://rungame/730/76561202255233023/+csgo_econ_action_preview%20M%listingid%A%assetid%D1234",
                            "name": "Inspect in Game..."
                        }]
                    }
                },
                "100": {
                    "listingid": "100",
                    "converted_price": 4000,
                    "converted_fee": 600,
                    "asset": {
                        "currency": 0, "appid": 730, "contextid": "2", "id": "32",
                        "market_actions": [{
                            "link": "steam://rungame/730/76561202255233023/+csgo_econ_action_preview%20M%listingid%A%assetid%D5678",
                            "name": "Inspect in Game..."
                        }]
                    }
                }
            },
            "assets": {"730": {"2": {
                "31": {"icon_url": "icon-a"},
                "32": {"icon_url": "icon-b"}
            }}}
        }"#
        .to_string()
    }

    #[test]
    fn test_parse_render_page_orders_by_price() {
        let page = parse_render_page(render_body().as_bytes(), "$").unwrap();
        assert_eq!(page.total_count, Some(57));
        assert_eq!(page.listings.len(), 2);

        let cheapest = &page.listings[0];
        assert_eq!(cheapest.price, "$46.00");
        assert_eq!(cheapest.image_url, format!("{IMAGE_BASE_URL}icon-b"));
        assert!(cheapest.inspect_link.ends_with("M100A32D5678"));

        assert_eq!(page.listings[1].price, "$57.50");
        assert!(page.listings[1].inspect_link.ends_with("M900A31D1234"));
    }

    #[test]
    fn test_parse_render_page_empty_listing_array() {
        let body = br#"{"success": true, "total_count": 0, "listinginfo": [], "assets": []}"#;
        let page = parse_render_page(body, "$").unwrap();
        assert!(page.listings.is_empty());
        assert!(page.confirms_empty());
    }

    #[test]
    fn test_parse_render_page_failure_flag() {
        let err = parse_render_page(br#"{"success": false}"#, "$").unwrap_err();
        assert!(matches!(err, SeedwatchError::SourceUnavailable(_)));
    }

    #[test]
    fn test_parse_render_page_garbage() {
        let err = parse_render_page(b"<html>busy</html>", "$").unwrap_err();
        assert!(matches!(err, SeedwatchError::ParseFailure(_)));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(5000, "$"), "$50.00");
        assert_eq!(format_price(5, "$"), "$0.05");
        assert_eq!(format_price(12345, "€"), "€123.45");
    }

    #[test]
    fn test_page_url_offsets() {
        let source = HttpListingSource::new(MARKET_URL, HttpSourceConfig::default()).unwrap();
        let url = source.page_url(3).unwrap();
        assert!(url.path().ends_with("/render/"));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["start"], "20");
        assert_eq!(pairs["count"], "10");
        assert_eq!(pairs["format"], "json");
    }

    #[test]
    fn test_page_url_offset_does_not_overflow() {
        let config = HttpSourceConfig {
            page_size: 100,
            ..Default::default()
        };
        let source = HttpListingSource::new(MARKET_URL, config).unwrap();
        let url = tokio_test::assert_ok!(source.page_url(u32::MAX));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["start"], (u64::from(u32::MAX - 1) * 100).to_string());
    }

    #[test]
    fn test_parse_float_response() {
        let details = parse_float_response(
            br#"{"iteminfo": {"floatvalue": 0.012, "paintseed": 16, "defindex": 1}}"#,
        )
        .unwrap();
        assert_eq!(details.pattern_id, 16);
        assert_eq!(details.condition_value, 0.012);
    }

    #[test]
    fn test_parse_float_response_error() {
        let err = parse_float_response(br#"{"error": "Valve's servers didn't reply", "code": 4}"#)
            .unwrap_err();
        assert!(matches!(err, SeedwatchError::ResolutionFailure(_)));

        let err = parse_float_response(br#"{"iteminfo": {"paintseed": 16}}"#).unwrap_err();
        assert!(matches!(err, SeedwatchError::ResolutionFailure(_)));
    }
}
