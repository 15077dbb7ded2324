//! Logs command - inspect and maintain the event log

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Local, TimeZone};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use renohub_core::services::logging::now_ms;
use renohub_core::services::{EntryPoint, LogEntry, LogFilter, LoggingService};

use super::get_renohub_dir;
use crate::output;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Latest entries, newest first
    Recent {
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Only this event, e.g. email_failed
        #[arg(long)]
        event: Option<String>,
        /// Only the last N days
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Entries that carry an error message
    Errors {
        #[arg(short, long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Delete entries older than N days
    Prune {
        #[arg(long, default_value = "30")]
        older_than_days: u32,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        #[arg(long)]
        json: bool,
    },
    /// Entry counts and database location
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Copy the log database to a file
    Export { output: PathBuf },
}

fn open_log() -> Result<LoggingService> {
    let dir = get_renohub_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(LoggingService::new(&dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))?)
}

fn local_time(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(at) => at.format("%d/%m/%Y %H:%M:%S").to_string(),
        None => timestamp_ms.to_string(),
    }
}

fn print_table(entries: &[LogEntry]) {
    let mut table = output::create_table();
    table.set_header(vec!["Time", "From", "Event", "About", ""]);

    for entry in entries {
        let about = match (&entry.entity_type, &entry.entity_id, &entry.command) {
            (Some(kind), Some(id), _) => format!("{} {}", kind, id),
            (_, _, Some(command)) => command.clone(),
            _ => String::new(),
        };
        let flag = match entry.error_message {
            Some(_) => "error".red().to_string(),
            None => String::new(),
        };
        table.add_row(vec![
            local_time(entry.timestamp),
            entry.entry_point.clone(),
            entry.event.clone(),
            about,
            flag,
        ]);
    }

    println!("{}", table);
}

fn print_entries(entries: &[LogEntry], json: bool, empty: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else if entries.is_empty() {
        println!("{}", empty);
    } else {
        print_table(entries);
    }
    Ok(())
}

pub fn run(command: LogsCommands) -> Result<()> {
    let log = open_log()?;

    match command {
        LogsCommands::Recent {
            limit,
            event,
            days,
            json,
        } => {
            let filter = LogFilter {
                event,
                since_ms: days.map(|d| now_ms() - i64::from(d) * DAY_MS),
                ..LogFilter::recent(limit)
            };
            print_entries(&log.entries(&filter)?, json, "No log entries found.")?;
        }
        LogsCommands::Errors { limit, json } => {
            let entries = log.entries(&LogFilter::errors(limit))?;
            if json || entries.is_empty() {
                return print_entries(&entries, json, "No errors logged.");
            }
            for entry in &entries {
                println!(
                    "{} {} {}",
                    local_time(entry.timestamp).dimmed(),
                    entry.event.bold(),
                    entry.error_message.as_deref().unwrap_or_default()
                );
                if let Some(details) = &entry.error_details {
                    println!("    {}", details.dimmed());
                }
            }
        }
        LogsCommands::Prune {
            older_than_days,
            force,
            json,
        } => {
            let confirmed = force
                || json
                || Confirm::new()
                    .with_prompt(format!("Delete log entries older than {} days?", older_than_days))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("Cancelled.");
                return Ok(());
            }

            let deleted = log.delete_before(now_ms() - i64::from(older_than_days) * DAY_MS)?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                output::success(&format!("Deleted {} log entries", deleted));
            }
        }
        LogsCommands::Stats { json } => {
            let total = log.count()?;
            let errors = log.count_errors()?;
            let size = std::fs::metadata(log.db_path()).map(|m| m.len()).unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "entries": total,
                        "errors": errors,
                        "path": log.db_path().to_string_lossy(),
                        "size_bytes": size,
                    })
                );
            } else {
                let mut table = output::create_table();
                table.add_row(vec!["Entries".to_string(), total.to_string()]);
                table.add_row(vec!["Errors".to_string(), errors.to_string()]);
                table.add_row(vec!["Database".to_string(), log.db_path().display().to_string()]);
                table.add_row(vec!["Size".to_string(), format!("{} KB", size / 1024)]);
                println!("{}", table);
            }
        }
        LogsCommands::Export { output: path } => {
            let written = log.export(&path)?;
            output::success(&format!("Log database copied to {}", written.display()));
        }
    }

    Ok(())
}
