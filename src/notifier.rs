//! Fire-and-forget fan-out of market events.
//!
//! Events are pushed to every registered [`EventSink`] and then forgotten.
//! Nothing is queued or replayed, so a subscriber that connects late has to
//! read the current state from the store instead.

use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::app::{Result, SeedwatchError};
use crate::domain::{Item, MarketEvent};
use crate::reconciler::ReconcileReport;

const BROADCAST_CAPACITY: usize = 256;

pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    /// Best-effort delivery. Errors are logged by the caller and never retried.
    fn broadcast(&self, event: &MarketEvent) -> Result<()>;
}

/// In-process push channel; each receiver gets every event published after it subscribed.
pub struct BroadcastSink {
    tx: broadcast::Sender<MarketEvent>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastSink {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn broadcast(&self, event: &MarketEvent) -> Result<()> {
        // No receivers is the normal idle state
        if self.tx.receiver_count() == 0 {
            return Ok(());
        }
        self.tx
            .send(event.clone())
            .map(|_| ())
            .map_err(|e| SeedwatchError::Other(format!("broadcast error: {e}")))
    }
}

/// Writes one structured log line per event.
pub struct LogSink;

impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn broadcast(&self, event: &MarketEvent) -> Result<()> {
        info!(
            kind = %event.kind,
            pattern_id = event.item.pattern_id,
            condition_value = event.item.condition_value,
            price = %event.item.price,
            "Market event"
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct Notifier {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Arc<dyn EventSink>) {
        match self.sinks.write() {
            Ok(mut sinks) => sinks.push(sink),
            Err(e) => warn!("Notifier lock poisoned, sink not registered: {}", e),
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn publish_added(&self, item: &Item) {
        self.publish_event(&MarketEvent::added(item.clone()));
    }

    pub fn publish_removed(&self, item: &Item) {
        self.publish_event(&MarketEvent::removed(item.clone()));
    }

    /// Forward every delta of a pass, additions first.
    pub fn publish(&self, report: &ReconcileReport) {
        for item in &report.added {
            self.publish_added(item);
        }
        for item in &report.removed {
            self.publish_removed(item);
        }
    }

    fn publish_event(&self, event: &MarketEvent) {
        let sinks: Vec<Arc<dyn EventSink>> = match self.sinks.read() {
            Ok(sinks) => sinks.clone(),
            Err(e) => {
                warn!("Notifier lock poisoned, dropping event: {}", e);
                return;
            }
        };

        for sink in sinks {
            if let Err(e) = sink.broadcast(event) {
                warn!(sink = sink.name(), kind = %event.kind, "Failed to deliver event: {}", e);
            } else {
                debug!(sink = sink.name(), kind = %event.kind, "Event delivered");
            }
        }
    }
}
