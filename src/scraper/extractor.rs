use serde_json::Value;

use crate::app::{Result, SeedwatchError};
use crate::scraper::ScraperConfig;
use crate::source::{ItemDetails, ListingPage, RawListing};

/// Builds the in-page extraction scripts and interprets what they return
pub struct PageExtractor {
    config: ScraperConfig,
}

fn js_string(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl PageExtractor {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    /// JavaScript returning `{found, total, rows: [{price, image, inspect}]}`
    /// for the current market page.
    pub fn listing_script(&self) -> String {
        let row = js_string(&self.config.listing_row_selector);
        let price = js_string(&self.config.price_selector);
        let image = js_string(&self.config.image_selector);
        let inspect = js_string(&self.config.inspect_selector);
        let total = js_string(&self.config.total_selector);

        format!(
            r#"
            (() => {{
                const rows = Array.from(document.querySelectorAll({row}));
                const totalEl = document.querySelector({total});
                return {{
                    found: rows.length > 0,
                    total: totalEl ? totalEl.textContent.trim() : null,
                    rows: rows.map(row => {{
                        const priceEl = row.querySelector({price});
                        const imageEl = row.querySelector({image});
                        const inspectEl = row.querySelector({inspect});
                        return {{
                            price: priceEl ? (priceEl.textContent || '').trim() : '',
                            image: imageEl ? (imageEl.src || '') : '',
                            inspect: inspectEl ? (inspectEl.href || '') : ''
                        }};
                    }})
                }};
            }})()
            "#
        )
    }

    /// JavaScript returning `{condition, pattern}` text from the detail page
    pub fn detail_script(&self) -> String {
        let condition = js_string(&self.config.condition_selector);
        let pattern = js_string(&self.config.pattern_selector);

        format!(
            r#"
            (() => {{
                const conditionEl = document.querySelector({condition});
                const patternEl = document.querySelector({pattern});
                return {{
                    condition: conditionEl ? conditionEl.textContent.trim() : null,
                    pattern: patternEl ? patternEl.textContent.trim() : null
                }};
            }})()
            "#
        )
    }

    /// Interpret the listing script result.
    ///
    /// A page with no rows is only accepted when the total counter reads zero;
    /// otherwise the markup is treated as missing.
    pub fn parse_listing_result(value: &Value) -> Result<ListingPage> {
        let total_count = value["total"].as_str().and_then(parse_count);

        let rows = value["rows"]
            .as_array()
            .ok_or_else(|| SeedwatchError::ParseFailure("listing rows missing".to_string()))?;

        if rows.is_empty() && total_count != Some(0) {
            return Err(SeedwatchError::ParseFailure(
                "no listing rows on page".to_string(),
            ));
        }

        let listings = rows
            .iter()
            .map(|row| RawListing {
                price: row["price"].as_str().unwrap_or("").to_string(),
                image_url: row["image"].as_str().unwrap_or("").to_string(),
                inspect_link: row["inspect"].as_str().unwrap_or("").to_string(),
            })
            .collect();

        Ok(ListingPage {
            listings,
            total_count,
        })
    }

    pub fn parse_detail_result(value: &Value) -> Result<ItemDetails> {
        let condition_text = value["condition"]
            .as_str()
            .ok_or_else(|| SeedwatchError::ResolutionFailure("float value missing".to_string()))?;
        let pattern_text = value["pattern"]
            .as_str()
            .ok_or_else(|| SeedwatchError::ResolutionFailure("paint seed missing".to_string()))?;

        let condition_value = condition_text.trim().parse::<f64>().map_err(|_| {
            SeedwatchError::ResolutionFailure(format!("bad float value: {condition_text}"))
        })?;
        let pattern_id = pattern_text.trim().parse::<i64>().map_err(|_| {
            SeedwatchError::ResolutionFailure(format!("bad paint seed: {pattern_text}"))
        })?;

        Ok(ItemDetails {
            condition_value,
            pattern_id,
        })
    }
}

/// Parse counters such as `"1,234"` or `"57"`.
fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_script_uses_configured_selectors() {
        let extractor = PageExtractor::new(ScraperConfig::default());
        let script = extractor.listing_script();

        assert!(script.contains("'.market_listing_row'"));
        assert!(script.contains("'.market_listing_price'"));
        assert!(script.contains("'#searchResults_total'"));
    }

    #[test]
    fn test_selectors_are_escaped() {
        let config = ScraperConfig {
            price_selector: "[data-x='1']".to_string(),
            ..Default::default()
        };
        let script = PageExtractor::new(config).listing_script();
        assert!(script.contains(r"'[data-x=\'1\']'"));
    }

    #[test]
    fn test_parse_listing_result() {
        let value = json!({
            "found": true,
            "total": "1,204",
            "rows": [
                {"price": "$50.00", "image": "https://img/a", "inspect": "steam://a"},
                {"price": "$51.00", "image": "", "inspect": ""}
            ]
        });
        let page = PageExtractor::parse_listing_result(&value).unwrap();
        assert_eq!(page.total_count, Some(1204));
        assert_eq!(page.listings.len(), 2);
        assert_eq!(page.listings[0].inspect_link, "steam://a");
        assert_eq!(page.listings[1].inspect_link, "");
    }

    #[test]
    fn test_parse_listing_result_missing_rows_is_parse_failure() {
        let value = json!({"found": false, "total": null, "rows": []});
        let err = PageExtractor::parse_listing_result(&value).unwrap_err();
        assert!(matches!(err, SeedwatchError::ParseFailure(_)));
    }

    #[test]
    fn test_parse_listing_result_confirmed_empty() {
        let value = json!({"found": false, "total": "0", "rows": []});
        let page = PageExtractor::parse_listing_result(&value).unwrap();
        assert!(page.confirms_empty());
    }

    #[test]
    fn test_parse_detail_result() {
        let value = json!({"condition": " 0.0712345 ", "pattern": "259"});
        let details = PageExtractor::parse_detail_result(&value).unwrap();
        assert_eq!(details.pattern_id, 259);
        assert_eq!(details.condition_value, 0.0712345);
    }

    #[test]
    fn test_parse_detail_result_missing_or_bad() {
        let missing = json!({"condition": null, "pattern": "16"});
        assert!(PageExtractor::parse_detail_result(&missing).is_err());

        let bad = json!({"condition": "0.1", "pattern": "n/a"});
        assert!(PageExtractor::parse_detail_result(&bad).is_err());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("57"), Some(57));
        assert_eq!(parse_count("1,204"), Some(1204));
        assert_eq!(parse_count("none"), None);
    }
}
