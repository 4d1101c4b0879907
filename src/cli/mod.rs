pub mod commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::Backend;
use crate::scheduler::parse_interval;

#[derive(Parser)]
#[command(name = "seedwatch")]
#[command(about = "Tracks rare-pattern market listings and reports when they appear or vanish", long_about = None)]
pub struct Cli {
    /// Listing back-end (overrides the config file)
    #[arg(long, value_enum, global = true)]
    pub backend: Option<Backend>,

    /// Database path (overrides the config file and SEEDWATCH_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted, printing events as JSON lines
    Run {
        /// Time between passes (e.g., "30s", "5m", "1h")
        #[arg(short, long, value_parser = parse_interval)]
        interval: Option<Duration>,

        /// Listing pages per pass
        #[arg(short, long)]
        pages: Option<u32>,
    },
    /// Run a single reconciliation pass
    Scan {
        /// Listing pages to walk
        #[arg(short, long)]
        pages: Option<u32>,
    },
    /// List tracked items
    List {
        /// Maximum rows to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Include items that are no longer listed
        #[arg(long)]
        all: bool,
    },
    /// Mark items unseen for a number of hours as unavailable
    Cleanup {
        /// Staleness threshold in hours
        #[arg(long)]
        hours: Option<i64>,
    },
    /// Show the pattern ids being watched
    Targets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_parses_interval() {
        let cli = Cli::parse_from(["seedwatch", "run", "--interval", "30s", "--pages", "3"]);
        match cli.command {
            Commands::Run { interval, pages } => {
                assert_eq!(interval, Some(Duration::from_secs(30)));
                assert_eq!(pages, Some(3));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["seedwatch", "list", "--all", "--backend", "http", "--db", "x.db"]);
        assert_eq!(cli.backend, Some(Backend::Http));
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert!(matches!(cli.command, Commands::List { all: true, limit: None }));
    }

    #[test]
    fn test_bad_interval_is_rejected() {
        assert!(Cli::try_parse_from(["seedwatch", "run", "--interval", "soon"]).is_err());
    }
}
