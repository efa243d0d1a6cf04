//! Lumber CLI
//!
//! Command-line interface for shipping and inspecting log batches.

mod commands;
mod config;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "lumber")]
#[command(about = "Lumber log batch CLI", long_about = None)]
struct Cli {
    /// Receiver URL
    #[arg(
        long,
        env = "LUMBER_COLLECTOR_URL",
        default_value = "http://localhost:4080"
    )]
    collector_url: String,

    /// Name reported as the batch's client
    #[arg(long, env = "LUMBER_CLIENT_NAME", default_value = "lumber-cli")]
    client_name: String,

    /// Request timeout in seconds
    #[arg(long, env = "LUMBER_REQUEST_TIMEOUT", default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        collector_url: cli.collector_url,
        client_name: cli.client_name,
        request_timeout: Duration::from_secs(cli.timeout),
    };

    handle_command(cli.command, &config).await
}
