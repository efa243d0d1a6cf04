//! Send command handler
//!
//! Ships log entries to the receiver as a single batch.

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use lumber_client::RemoteLogClient;

use super::read_entries;
use crate::config::Config;

/// Read entries from `input` and ship them, waiting for the receiver
pub async fn send_entries(config: &Config, input: Option<&Path>) -> Result<()> {
    let entries = read_entries(input)?;
    if entries.is_empty() {
        println!("{}", "No log entries to send.".yellow());
        return Ok(());
    }

    let client_config = config.client_config();
    client_config.validate()?;
    let client: RemoteLogClient = RemoteLogClient::connect(&client_config)?;

    client
        .open()
        .await
        .with_context(|| format!("Failed to reach receiver at {}", config.collector_url))?;

    let sent = client.send_batch(&entries).await;

    if let Err(e) = client.close().await {
        eprintln!("{} {}", "⚠ Failed to close channel:".yellow(), e);
    }

    sent.context("Failed to ship batch")?;

    println!(
        "{} Shipped {} log entr{} to {}",
        "✓".green(),
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" },
        config.collector_url.cyan()
    );

    Ok(())
}
