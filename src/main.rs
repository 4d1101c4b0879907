use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use seedwatch::app::AppContext;
use seedwatch::cli::{commands, Cli, Commands};
use seedwatch::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(backend) = cli.backend {
        config.monitor.backend = backend;
    }
    if let Some(db) = cli.db {
        config.database.path = Some(db);
    }

    match cli.command {
        Commands::Run { interval, pages } => {
            if let Some(pages) = pages {
                config.monitor.max_pages = pages;
            }
            let interval = match interval {
                Some(i) => i,
                None => config.monitor.interval()?,
            };
            let ctx = AppContext::new(config).await?;
            commands::run(&ctx, interval).await?;
        }
        Commands::Scan { pages } => {
            let pages = pages.unwrap_or(config.monitor.max_pages);
            let ctx = AppContext::new(config).await?;
            commands::scan(&ctx, pages).await?;
        }
        Commands::List { limit, all } => {
            let limit = limit.unwrap_or(config.monitor.list_limit);
            let ctx = AppContext::read_only(config)?;
            commands::list(&ctx, limit, all).await?;
        }
        Commands::Cleanup { hours } => {
            let hours = hours.unwrap_or(config.monitor.stale_threshold_hours);
            let ctx = AppContext::read_only(config)?;
            commands::cleanup(&ctx, hours).await?;
        }
        Commands::Targets => {
            let ctx = AppContext::read_only(config)?;
            commands::targets(&ctx);
        }
    }

    Ok(())
}
