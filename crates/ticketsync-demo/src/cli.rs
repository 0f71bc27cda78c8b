use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ticketsync-demo")]
#[command(
    author,
    version,
    about = "Watch a live remaining-ticket count or serve a mock ticket feed"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow an event's remaining count and print every update as JSON
    Watch {
        /// Session configuration file (YAML, TOML or JSON)
        #[arg(short, long, env = "TICKETSYNC_CONFIG")]
        config: Option<PathBuf>,

        /// Snapshot URL, overrides the configured sources
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Named source to read the snapshot from
        #[arg(short, long)]
        source: Option<String>,

        /// Push channel base address (ws:// or wss://)
        #[arg(short, long)]
        push: Option<String>,

        /// Polling interval in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Simulate a one-ticket purchase every N seconds
        #[arg(long)]
        purchase_every: Option<u64>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Serve a mock ticket feed over HTTP and WebSocket
    Serve {
        /// Listen port
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Listen address
        #[arg(short, long, default_value = "127.0.0.1")]
        address: String,

        /// Identifier of the served event
        #[arg(long, default_value = "153")]
        event_id: u64,

        /// Total ticket quota
        #[arg(long, default_value = "30000")]
        quota: u64,

        /// Tickets left at startup
        #[arg(long, default_value = "29300")]
        remaining: u64,

        /// Automatic sales per second (0 = manual only)
        #[arg(short, long, default_value = "0")]
        rate: f64,

        /// Largest batch sold in one automatic sale
        #[arg(long, default_value = "4")]
        max_batch: u32,

        /// Allow cross-origin requests from any origin
        #[arg(long, env = "TICKETSYNC_DEMO_ALLOW_ANY_ORIGIN")]
        allow_any_origin: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}
