use serde::{Deserialize, Serialize};

use crate::domain::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Added,
    Removed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Added => write!(f, "added"),
            EventKind::Removed => write!(f, "removed"),
        }
    }
}

/// A delta pushed to subscribers after a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub kind: EventKind,
    pub item: Item,
}

impl MarketEvent {
    pub fn added(item: Item) -> Self {
        Self {
            kind: EventKind::Added,
            item,
        }
    }

    pub fn removed(item: Item) -> Self {
        Self {
            kind: EventKind::Removed,
            item,
        }
    }
}
