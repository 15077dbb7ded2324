//! Expense command - track and export job expenses

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use renohub_core::validation::common::format_date;
use renohub_core::validation::ExpenseForm;

use super::{acting_user, get_context, log_command, parse_id};
use crate::output;

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense against a job
    Add {
        /// Job id
        job: String,
        #[arg(long)]
        name: String,
        /// Dollars, up to two decimals
        #[arg(long)]
        cost: String,
        /// Material, Labour, Permit, ...
        #[arg(long)]
        category: String,
        /// DD/MM/YYYY, today when omitted
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete an expense
    Delete {
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// List a job's expenses with its total
    List {
        /// Job id
        job: String,
        #[arg(long, default_value = "1")]
        page: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Totals per category for a renovation record
    Summary {
        /// Renovation record id
        record: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a record's expenses as CSV
    Export {
        /// Renovation record id
        record: String,
        /// File to write, stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

pub fn run(command: ExpenseCommands, acting_as: Option<&str>) -> Result<()> {
    let ctx = get_context()?;
    let user = acting_user(&ctx, acting_as)?;

    match command {
        ExpenseCommands::Add {
            job,
            name,
            cost,
            category,
            date,
        } => {
            log_command(&ctx, "expense add");
            let date = date.unwrap_or_else(|| format_date(chrono::Local::now().date_naive()));
            let form = ExpenseForm {
                name,
                cost,
                category,
                date,
            };
            let expense = ctx.expense_service.add_expense(user.id, parse_id(&job)?, &form)?;
            output::success(&format!(
                "Recorded {} for '{}'",
                output::money(expense.cost),
                expense.name
            ));
        }
        ExpenseCommands::Delete { id, force } => {
            log_command(&ctx, "expense delete");
            let id = parse_id(&id)?;
            if !force
                && !Confirm::new()
                    .with_prompt("Delete this expense?")
                    .default(false)
                    .interact()?
            {
                println!("{}", "Cancelled".dimmed());
                return Ok(());
            }
            ctx.expense_service.delete_expense(user.id, id)?;
            output::success("Expense deleted");
        }
        ExpenseCommands::List { job, page, json } => {
            let job = parse_id(&job)?;
            let expenses = ctx.expense_service.list_expenses(user.id, job, page)?;
            let total = ctx.expense_service.job_total(user.id, job)?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "expenses": expenses,
                        "total": total,
                    }))?
                );
                return Ok(());
            }
            if expenses.items.is_empty() {
                println!("No expenses recorded.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Date", "Name", "Category", "Cost"]);
            for expense in &expenses.items {
                table.add_row(vec![
                    expense.id.to_string(),
                    format_date(expense.date),
                    expense.name.clone(),
                    expense.category.to_string(),
                    output::money(expense.cost),
                ]);
            }
            println!("{}", table);
            output::page_footer(&expenses);
            println!("{} {}", "Total:".bold(), output::money(total));
        }
        ExpenseCommands::Summary { record, json } => {
            let record = parse_id(&record)?;
            let totals = ctx.expense_service.record_totals_by_category(user.id, record)?;
            let total = ctx.expense_service.record_total(user.id, record)?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "categories": totals,
                        "total": total,
                    }))?
                );
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Category", "Total"]);
            for line in &totals {
                table.add_row(vec![line.category.to_string(), output::money(line.total)]);
            }
            table.add_row(vec!["All".bold().to_string(), output::money(total).bold().to_string()]);
            println!("{}", table);
        }
        ExpenseCommands::Export { record, output: path } => {
            log_command(&ctx, "expense export");
            let record = parse_id(&record)?;
            match path {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    let rows = ctx.expense_service.export_csv(user.id, record, BufWriter::new(file))?;
                    output::success(&format!("Wrote {} expenses to {}", rows, path.display()));
                }
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    ctx.expense_service.export_csv(user.id, record, &mut handle)?;
                    handle.flush()?;
                }
            }
        }
    }

    Ok(())
}
