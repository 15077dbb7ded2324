//! Renohub CLI - renovation marketplace in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{expense, job, logs, purge, quote, record, search, status, user};

/// Renohub - plan renovations, post jobs and trade quotes
#[derive(Parser)]
#[command(name = "renohub", version, about, long_about = None)]
struct Cli {
    /// Email of the account to act as
    #[arg(long = "as", global = true, env = "RENOHUB_USER")]
    acting_as: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show marketplace summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register, verify and recover accounts
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Manage renovation records, their rooms and tags
    Record {
        #[command(subcommand)]
        command: record::RecordCommands,
    },

    /// Manage jobs on a renovation record
    Job {
        #[command(subcommand)]
        command: job::JobCommands,
    },

    /// Submit and answer quotes
    Quote {
        #[command(subcommand)]
        command: quote::QuoteCommands,
    },

    /// Track job expenses
    Expense {
        #[command(subcommand)]
        command: expense::ExpenseCommands,
    },

    /// Search posted job listings
    Search(search::SearchArgs),

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Remove expired reset tokens and unverified accounts
    Purge {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&output::describe(&e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let acting_as = cli.acting_as.as_deref();
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::User { command } => user::run(command, acting_as),
        Commands::Record { command } => record::run(command, acting_as),
        Commands::Job { command } => job::run(command, acting_as),
        Commands::Quote { command } => quote::run(command, acting_as),
        Commands::Expense { command } => expense::run(command, acting_as),
        Commands::Search(args) => search::run(args),
        Commands::Logs { command } => logs::run(command),
        Commands::Purge { json } => purge::run(json),
    }
}
