//! Periodic reconciliation with a single-flight guard.
//!
//! A timer task ticks at a fixed period. Every tick tries to take the pass
//! guard; if a pass is still running the tick is dropped. Passes run on their
//! own tasks so stopping the timer never cuts one short.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::app::{Result, SeedwatchError};
use crate::notifier::Notifier;
use crate::reconciler::{ReconcileReport, Reconciler};

/// Parse interval strings like "30s", "5m", "1h", "1d" or raw seconds.
pub fn parse_interval(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim().to_lowercase();

    let secs = if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .map(|h| h * 3600)
            .map_err(|_| format!("Invalid hours: {}", hours))?
    } else if let Some(minutes) = s.strip_suffix('m') {
        minutes
            .parse::<u64>()
            .map(|m| m * 60)
            .map_err(|_| format!("Invalid minutes: {}", minutes))?
    } else if let Some(days) = s.strip_suffix('d') {
        days.parse::<u64>()
            .map(|d| d * 86400)
            .map_err(|_| format!("Invalid days: {}", days))?
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map_err(|_| format!("Invalid seconds: {}", secs))?
    } else {
        s.parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '30s', '5m', '1h'", s))?
    };

    if secs == 0 {
        return Err("Interval must be greater than zero".to_string());
    }
    Ok(Duration::from_secs(secs))
}

/// Format an interval for display
pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Single-flight flag shared by scheduled and manual passes.
#[derive(Clone, Default)]
pub struct PassGuard {
    running: Arc<AtomicBool>,
}

/// Held for the duration of a pass; releases the guard on drop.
pub struct PassPermit {
    running: Arc<AtomicBool>,
}

impl PassGuard {
    pub fn try_acquire(&self) -> Option<PassPermit> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| PassPermit {
                running: self.running.clone(),
            })
    }

    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for PassPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

struct PassRunner {
    reconciler: Arc<Reconciler>,
    notifier: Arc<Notifier>,
    guard: PassGuard,
}

impl PassRunner {
    /// Start a pass on its own task, or return `None` if one is already running.
    fn spawn_pass(
        self: &Arc<Self>,
        max_pages: u32,
        trigger: &'static str,
    ) -> Option<JoinHandle<Result<ReconcileReport>>> {
        let permit = self.guard.try_acquire()?;
        let runner = self.clone();

        Some(tokio::spawn(async move {
            let _permit = permit;
            info!(trigger, max_pages, "Starting reconciliation pass");

            let result = runner.reconciler.reconcile(max_pages).await;
            match &result {
                Ok(report) => runner.notifier.publish(report),
                Err(e) => error!(trigger, "Reconciliation pass failed: {}", e),
            }
            result
        }))
    }
}

pub struct Scheduler {
    runner: Arc<PassRunner>,
    max_pages: u32,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(reconciler: Arc<Reconciler>, notifier: Arc<Notifier>, max_pages: u32) -> Self {
        Self {
            runner: Arc::new(PassRunner {
                reconciler,
                notifier,
                guard: PassGuard::default(),
            }),
            max_pages,
            timer: Mutex::new(None),
        }
    }

    /// Run a pass now and then every `period`. Returns `false` if already running.
    pub fn start(&self, period: Duration) -> bool {
        let mut timer = match self.timer.lock() {
            Ok(timer) => timer,
            Err(poisoned) => poisoned.into_inner(),
        };

        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Scheduler already running");
            return false;
        }

        let runner = self.runner.clone();
        let max_pages = self.max_pages;

        info!(
            interval = %format_interval(period),
            max_pages,
            "Scheduler started"
        );

        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                // First tick completes immediately
                ticker.tick().await;
                if runner.spawn_pass(max_pages, "scheduled").is_none() {
                    info!("Previous pass still running, skipping tick");
                }
            }
        }));

        true
    }

    /// Cancel the timer. A pass already in flight runs to completion.
    pub fn stop(&self) -> bool {
        let mut timer = match self.timer.lock() {
            Ok(timer) => timer,
            Err(poisoned) => poisoned.into_inner(),
        };

        match timer.take() {
            Some(handle) => {
                handle.abort();
                info!("Scheduler stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        match self.timer.lock() {
            Ok(timer) => timer.as_ref().is_some_and(|handle| !handle.is_finished()),
            Err(_) => false,
        }
    }

    /// Whether a pass (scheduled or manual) is executing right now.
    pub fn pass_active(&self) -> bool {
        self.runner.guard.is_active()
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Run one manual pass, failing fast if another pass holds the guard.
    ///
    /// The pass lives on its own task; dropping this future does not cancel it.
    pub async fn run_now(&self, max_pages: u32) -> Result<ReconcileReport> {
        let handle = self
            .runner
            .spawn_pass(max_pages, "manual")
            .ok_or(SeedwatchError::PassInProgress)?;

        handle
            .await
            .map_err(|e| SeedwatchError::Other(format!("Reconciliation task failed: {}", e)))?
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Ok(mut timer) = self.timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetSet;
    use crate::notifier::BroadcastSink;
    use crate::reconciler::DEFAULT_STALE_THRESHOLD_HOURS;
    use crate::scanner::{ScanSettings, Scanner};
    use crate::source::testing::{listing, StaticResolver, StaticSource};
    use crate::store::{SqliteStore, Store};

    struct Fixture {
        source: Arc<StaticSource>,
        store: Arc<SqliteStore>,
        sink: Arc<BroadcastSink>,
        scheduler: Scheduler,
    }

    fn fixture(delay: Option<Duration>) -> Fixture {
        let source = Arc::new(StaticSource::new());
        let resolver = Arc::new(StaticResolver::new());
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        source.set_page(1, vec![listing("a", "$50")]);
        resolver.insert("a", 16, 0.012);
        if let Some(delay) = delay {
            source.set_delay(delay);
        }

        let scanner = Scanner::new(
            source.clone(),
            resolver,
            store.clone(),
            TargetSet::new([16]),
            ScanSettings::default(),
        );
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            scanner,
            DEFAULT_STALE_THRESHOLD_HOURS,
        ));
        let notifier = Arc::new(Notifier::new());
        let sink = Arc::new(BroadcastSink::new());
        notifier.register(sink.clone());

        Fixture {
            source,
            store,
            sink,
            scheduler: Scheduler::new(reconciler, notifier, 1),
        }
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_interval("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_interval("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_interval("600").unwrap(), Duration::from_secs(600));
        assert!(parse_interval("invalid").is_err());
        assert!(parse_interval("0m").is_err());
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_secs(3600)), "1h");
        assert_eq!(format_interval(Duration::from_secs(300)), "5m");
        assert_eq!(format_interval(Duration::from_secs(86400)), "1d");
        assert_eq!(format_interval(Duration::from_secs(90)), "90s");
    }

    #[test]
    fn test_guard_is_single_flight() {
        let guard = PassGuard::default();
        let permit = guard.try_acquire();
        assert!(permit.is_some());
        assert!(guard.try_acquire().is_none());
        drop(permit);
        assert!(!guard.is_active());
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_run_now_publishes_deltas() {
        let f = fixture(None);
        let mut rx = f.sink.subscribe();

        let report = f.scheduler.run_now(1).await.unwrap();

        assert_eq!(report.added.len(), 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.item.pattern_id, 16);
        assert!(!f.scheduler.pass_active());
    }

    #[tokio::test]
    async fn test_concurrent_manual_pass_is_rejected() {
        let f = Arc::new(fixture(Some(Duration::from_millis(200))));

        let first = {
            let f = f.clone();
            tokio::spawn(async move { f.scheduler.run_now(1).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = f.scheduler.run_now(1).await;
        assert!(matches!(second, Err(SeedwatchError::PassInProgress)));

        let report = first.await.unwrap().unwrap();
        assert_eq!(report.added.len(), 1);
        assert_eq!(f.source.calls(), 1);
        assert_eq!(f.store.all_items().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ticks_during_a_pass_are_skipped() {
        let f = fixture(Some(Duration::from_millis(150)));

        assert!(f.scheduler.start(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.scheduler.stop();

        // Without the guard roughly ten passes would have started by now
        assert_eq!(f.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let f = fixture(None);

        assert!(!f.scheduler.is_running());
        assert!(f.scheduler.start(Duration::from_secs(60)));
        assert!(f.scheduler.is_running());
        assert!(!f.scheduler.start(Duration::from_secs(60)));

        assert!(f.scheduler.stop());
        assert!(!f.scheduler.is_running());
        assert!(!f.scheduler.stop());
    }

    #[tokio::test]
    async fn test_start_runs_a_pass_immediately() {
        let f = fixture(None);
        let mut rx = f.sink.subscribe();

        f.scheduler.start(Duration::from_secs(3600));
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        f.scheduler.stop();

        assert_eq!(event.item.pattern_id, 16);
        assert_eq!(f.store.counts().unwrap().available, 1);
    }

    #[tokio::test]
    async fn test_stop_lets_running_pass_finish() {
        let f = fixture(Some(Duration::from_millis(100)));
        let mut rx = f.sink.subscribe();

        f.scheduler.start(Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.scheduler.pass_active());
        f.scheduler.stop();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.item.pattern_id, 16);
        assert_eq!(f.store.counts().unwrap().available, 1);
    }
}
