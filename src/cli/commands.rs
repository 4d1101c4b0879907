use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use crate::app::{AppContext, Result, SeedwatchError};
use crate::domain::Item;
use crate::reconciler::ReconcileReport;
use crate::scheduler::format_interval;

/// Run the scheduler until Ctrl-C, printing each event as one JSON line.
pub async fn run(ctx: &AppContext, interval: Duration) -> Result<()> {
    let scheduler = ctx
        .scheduler
        .as_ref()
        .ok_or_else(|| SeedwatchError::Config("no listing back-end configured".to_string()))?;

    let mut events = ctx.events.subscribe();
    scheduler.start(interval);
    eprintln!(
        "Watching {} pattern ids every {} (Ctrl-C to stop)",
        ctx.config.monitor.target_seeds.len(),
        format_interval(interval)
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    scheduler.stop();
    if scheduler.pass_active() {
        eprintln!("Waiting for the current pass to finish...");
        while scheduler.pass_active() {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
    Ok(())
}

pub async fn scan(ctx: &AppContext, pages: u32) -> Result<()> {
    println!("Scanning {} page(s)...", pages);
    let report = ctx.query.trigger_scan(pages).await?;
    print_report(&report);
    Ok(())
}

pub async fn list(ctx: &AppContext, limit: usize, all: bool) -> Result<()> {
    let items = if all {
        ctx.query.list_all().await?
    } else {
        ctx.query.list_available(limit).await?
    };

    if items.is_empty() {
        println!("No items");
        return Ok(());
    }

    for item in &items {
        println!("{}", format_item(item));
    }

    let counts = ctx.query.counts().await?;
    println!("\n{} available, {} tracked", counts.available, counts.total);
    Ok(())
}

pub async fn cleanup(ctx: &AppContext, hours: i64) -> Result<()> {
    let flipped = ctx.query.run_cleanup(hours).await?;
    println!("Marked {} item(s) unavailable (unseen for {}h)", flipped, hours);
    Ok(())
}

pub fn targets(ctx: &AppContext) {
    let targets = ctx.config.monitor.targets();
    let seeds: Vec<String> = targets.iter().map(|s| s.to_string()).collect();
    println!("{} pattern ids: {}", targets.len(), seeds.join(", "));
}

fn print_report(report: &ReconcileReport) {
    let scan = &report.scan;
    println!(
        "Pages: {} loaded, {} failed; {} listings, {} resolved, {} matches",
        scan.pages_loaded, scan.pages_failed, scan.listings_seen, scan.resolved, scan.matches
    );

    if report.suppressed {
        println!("Scan was inconclusive; no removals were recorded");
    }

    for item in &report.added {
        println!("+ {}", format_item(item));
    }
    for item in &report.removed {
        println!("- {}", format_item(item));
    }

    println!(
        "Added {}, removed {}, stale {}",
        report.added.len(),
        report.removed.len(),
        report.stale_marked
    );
}

fn format_item(item: &Item) -> String {
    let marker = if item.is_available { "●" } else { " " };
    format!(
        "{} seed {:>4}  float {:.10}  {:>10}  found {}  {}",
        marker,
        item.pattern_id,
        item.condition_value,
        item.price,
        item.first_seen.format("%Y-%m-%d %H:%M"),
        item.inspect_link
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_item() {
        let seen = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let item = Item::sighted(16, 0.012, "$50.00", "steam://x", "img", seen);
        let line = format_item(&item);

        assert!(line.starts_with("● seed   16"));
        assert!(line.contains("float 0.0120000000"));
        assert!(line.contains("found 2024-03-01 12:30"));
        assert!(line.ends_with("steam://x"));
    }
}
