pub mod event;
pub mod item;
pub mod targets;

pub use event::{EventKind, MarketEvent};
pub use item::{Item, ItemKey};
pub use targets::{TargetSet, DEFAULT_TARGET_SEEDS};
