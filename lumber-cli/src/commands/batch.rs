//! Batch file command handlers
//!
//! Encodes entries into batch files and inspects existing ones, without
//! talking to a receiver.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use lumber_core::{BatchBuilder, LogEntry, LogEventBatch, LogLevel, codec};

use super::read_entries;
use crate::config::Config;

/// Encode entries from `input` into a batch written to `output`, or stdout
pub fn encode_entries(config: &Config, input: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let entries = read_entries(input)?;

    let mut builder = BatchBuilder::new(Some(config.client_name.clone()));
    builder
        .extend(&entries)
        .context("Failed to build batch")?;
    let payload = codec::encode(&builder.build()).context("Failed to encode batch")?;

    match output {
        Some(path) => {
            std::fs::write(path, &payload)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} Encoded {} entries ({} bytes) to {}",
                "✓".green(),
                entries.len(),
                payload.len(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&payload)?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}

/// Decode the batch in `file` and print its resolved entries
pub fn inspect_batch(file: &Path, prefix: &str, json: bool) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let batch = codec::decode(&bytes).context("Failed to decode batch")?;
    let entries = codec::expand(&batch, prefix).context("Failed to expand batch")?;

    if json {
        for entry in &entries {
            println!("{}", serde_json::to_string(entry)?);
        }
        return Ok(());
    }

    print_batch_summary(&batch);

    if entries.is_empty() {
        println!("{}", "Batch contains no events.".yellow());
        return Ok(());
    }

    println!("{}", "─".repeat(80).dimmed());
    for entry in &entries {
        print_log_entry(entry);
    }
    println!("{}", "─".repeat(80).dimmed());

    Ok(())
}

fn print_batch_summary(batch: &LogEventBatch) {
    println!("{}", "Batch:".bold());
    println!(
        "  Client:  {}",
        batch.client_name().unwrap_or("(unnamed)").cyan()
    );
    match batch.base_timestamp().to_datetime() {
        Some(at) => println!("  Base:    {}", at.format("%Y-%m-%d %H:%M:%S%.3f UTC")),
        None => println!("  Base:    {} ticks", batch.base_timestamp().0),
    }
    println!("  Events:  {}", batch.len());
    println!("  Strings: {}", batch.strings().len());
    println!("  Layouts: {}", batch.layout_names().len());
    println!();
}

/// Print a log entry
fn print_log_entry(entry: &LogEntry) {
    let level_str = format!("{:<5}", entry.level.to_string());
    let level_colored = match entry.level {
        LogLevel::Trace => level_str.dimmed(),
        LogLevel::Debug => level_str.dimmed(),
        LogLevel::Info => level_str.cyan(),
        LogLevel::Warn => level_str.yellow(),
        LogLevel::Error => level_str.red(),
        LogLevel::Fatal => level_str.red().bold(),
    };

    let time = entry
        .timestamp
        .to_datetime()
        .map(|at| at.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| entry.timestamp.0.to_string());

    println!(
        "{} [{}] {} {}",
        time.dimmed(),
        level_colored,
        entry.logger_name.bold(),
        entry.message
    );

    for (name, value) in &entry.properties {
        println!("    {} = {}", name.cyan(), value);
    }

    if let Some(exception) = &entry.exception {
        println!("    {}", exception.red());
    }
}
