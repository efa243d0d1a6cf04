//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod batch;
mod send;

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use lumber_core::LogEntry;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Ship log entries (JSON lines) to the receiver as one batch
    Send {
        /// Input file; reads stdin when omitted or "-"
        input: Option<PathBuf>,
    },
    /// Encode log entries (JSON lines) into a batch file
    Encode {
        /// Input file; reads stdin when omitted or "-"
        input: Option<PathBuf>,

        /// Output file; writes stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode a batch file and print its entries
    Inspect {
        /// Encoded batch file
        file: PathBuf,

        /// Prefix prepended to every logger name
        #[arg(long, default_value = "")]
        prefix: String,

        /// Print entries as JSON lines instead of formatted text
        #[arg(long)]
        json: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Send { input } => send::send_entries(config, input.as_deref()).await,
        Commands::Encode { input, output } => {
            batch::encode_entries(config, input.as_deref(), output.as_deref())
        }
        Commands::Inspect { file, prefix, json } => batch::inspect_batch(&file, &prefix, json),
    }
}

/// Read JSON-lines log entries from `input`, or stdin
fn read_entries(input: Option<&Path>) -> Result<Vec<LogEntry>> {
    let reader: Box<dyn Read> = match input {
        Some(path) if path != Path::new("-") => Box::new(
            std::fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        _ => Box::new(std::io::stdin()),
    };

    parse_entries(BufReader::new(reader))
}

/// Parse one `LogEntry` per non-blank line
fn parse_entries(reader: impl BufRead) -> Result<Vec<LogEntry>> {
    let mut entries = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: LogEntry = serde_json::from_str(&line)
            .with_context(|| format!("Invalid log entry on line {}", number + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumber_core::{LogLevel, Ticks};

    #[test]
    fn test_parse_entries_skips_blank_lines() {
        let input = concat!(
            r#"{"timestamp":1,"level":"Info","logger_name":"App","message":"one"}"#,
            "\n\n",
            r#"{"timestamp":2,"level":"Error","logger_name":"App","message":"two","exception":"boom"}"#,
            "\n"
        );

        let entries = parse_entries(input.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, Ticks(1));
        assert_eq!(entries[1].level, LogLevel::Error);
        assert_eq!(entries[1].exception.as_deref(), Some("boom"));
    }

    #[test]
    fn test_parse_entries_reports_line() {
        let input = "{\"timestamp\":1,\"level\":\"Info\",\"logger_name\":\"App\",\"message\":\"ok\"}\nnot json\n";
        let err = parse_entries(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
