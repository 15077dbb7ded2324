//! Status command - marketplace summary

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Renohub Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Users".to_string(), status.total_users.to_string()]);
    table.add_row(vec!["Renovation records".to_string(), status.total_records.to_string()]);
    table.add_row(vec![
        "Jobs".to_string(),
        format!("{} ({} listed)", status.total_jobs, status.posted_jobs),
    ]);
    table.add_row(vec!["Quotes".to_string(), status.total_quotes.to_string()]);
    table.add_row(vec!["Expenses".to_string(), status.total_expenses.to_string()]);
    println!("{}", table);
    println!();

    println!("{}", "Integrations".bold());
    for integration in &status.integrations {
        println!("  • {}: {}", integration.concern, integration.adapter);
    }
    println!("  • mail: outbox at {}", ctx.config.outbox_dir(&ctx.data_dir).display());
    println!();

    let size = ctx.repository.get_db_size().unwrap_or(0);
    println!(
        "{}",
        format!("Database: {} ({} KB)", ctx.repository.db_path().display(), size / 1024).dimmed()
    );

    Ok(())
}
