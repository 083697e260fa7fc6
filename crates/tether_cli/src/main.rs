//! Tether CLI
//!
//! Command-line tools for the state Tether keeps on disk.
//!
//! # Commands
//!
//! - `queue` - List, add to, clear or replay the offline queue
//! - `sync` - Show the persisted sync cursor and schedule
//! - `link` - Parse or build deep links

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tether command-line tools.
#[derive(Parser)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or replay the offline queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Inspect sync metadata
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },

    /// Parse or build deep links
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum QueueAction {
    /// List queued requests in drain order
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Queue a request
    Add {
        /// HTTP method
        #[arg(short, long, default_value = "POST")]
        method: String,

        /// Target URL, absolute or relative to the drain base URL
        url: String,

        /// Request body
        #[arg(short, long)]
        body: Option<String>,

        /// Priority; higher drains first
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        priority: i32,
    },

    /// Remove every queued request
    Clear,

    /// Send queued requests now
    Drain {
        /// Base URL for relative request URLs
        #[arg(short, long)]
        base_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Show the sync cursor and whether a sync is due
    Status {
        /// Sync interval in seconds
        #[arg(short, long, default_value = "300")]
        interval_secs: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum LinkAction {
    /// Parse a deep link
    Parse {
        /// The link to parse
        link: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Build a deep link
    Make {
        /// URI scheme
        #[arg(short, long)]
        scheme: String,

        /// Link path
        #[arg(long, default_value = "")]
        path: String,

        /// Query parameter as name=value; may be repeated
        #[arg(short = 'P', long = "param")]
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Queue { action } => {
            let dir = cli.dir.ok_or("Data directory required for queue")?;
            match action {
                QueueAction::List { format } => commands::queue::list(&dir, &format).await?,
                QueueAction::Add {
                    method,
                    url,
                    body,
                    priority,
                } => {
                    commands::queue::add(&dir, &method, &url, body, priority).await?;
                }
                QueueAction::Clear => commands::queue::clear(&dir).await?,
                QueueAction::Drain { base_url } => {
                    commands::queue::drain(&dir, base_url.as_deref()).await?
                }
            }
        }
        Commands::Sync { action } => {
            let dir = cli.dir.ok_or("Data directory required for sync")?;
            match action {
                SyncAction::Status {
                    interval_secs,
                    format,
                } => commands::sync::status(&dir, interval_secs, &format).await?,
            }
        }
        Commands::Link { action } => match action {
            LinkAction::Parse { link, format } => commands::link::parse(&link, &format)?,
            LinkAction::Make {
                scheme,
                path,
                params,
            } => commands::link::make(&scheme, &path, &params)?,
        },
        Commands::Version => {
            println!("Tether CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
