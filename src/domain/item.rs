use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Natural key of a tracked item: `(pattern_id, condition_value)`.
///
/// The float is compared bit-for-bit so two sightings only merge when both
/// attributes match exactly. `-0.0` is folded into `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pattern_id: i64,
    condition_bits: u64,
}

impl ItemKey {
    pub fn new(pattern_id: i64, condition_value: f64) -> Self {
        let normalized = if condition_value == 0.0 { 0.0 } else { condition_value };
        Self {
            pattern_id,
            condition_bits: normalized.to_bits(),
        }
    }

    pub fn pattern_id(&self) -> i64 {
        self.pattern_id
    }

    pub fn condition_value(&self) -> f64 {
        f64::from_bits(self.condition_bits)
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.pattern_id, self.condition_value())
    }
}

/// A marketplace listing whose pattern id is on the target list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub pattern_id: i64,
    pub condition_value: f64,
    pub price: String,
    pub inspect_link: String,
    pub image_url: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_available: bool,
}

impl Item {
    /// Build a fresh sighting observed at `seen_at`.
    pub fn sighted(
        pattern_id: i64,
        condition_value: f64,
        price: impl Into<String>,
        inspect_link: impl Into<String>,
        image_url: impl Into<String>,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pattern_id,
            condition_value,
            price: price.into(),
            inspect_link: inspect_link.into(),
            image_url: image_url.into(),
            first_seen: seen_at,
            last_seen: seen_at,
            is_available: true,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.pattern_id, self.condition_value)
    }

    /// Stable identifier derived from the natural key
    pub fn id(&self) -> String {
        Self::generate_id(&self.key())
    }

    pub fn generate_id(key: &ItemKey) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.pattern_id().to_be_bytes());
        hasher.update(key.condition_value().to_bits().to_be_bytes());
        hex::encode(hasher.finalize())
    }

    /// Condition values outside [0, 1] or non-finite are never persisted.
    pub fn has_valid_condition(&self) -> bool {
        self.condition_value.is_finite() && (0.0..=1.0).contains(&self.condition_value)
    }
}
