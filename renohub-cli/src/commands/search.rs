//! Search command - browse posted job listings

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use renohub_core::services::ListingFilter;
use renohub_core::validation::common::format_date;
use renohub_core::JobType;

use super::{date_arg, get_context, log_command};
use crate::output;

#[derive(Args)]
pub struct SearchArgs {
    /// Match job name or description
    keyword: Option<String>,
    /// Job types, any of (repeat or comma separate)
    #[arg(long = "type", value_delimiter = ',')]
    job_types: Vec<JobType>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    suburb: Option<String>,
    /// Tags the record must all carry (repeat or comma separate)
    #[arg(long = "tag", value_delimiter = ',')]
    tags: Vec<String>,
    /// Starting on or after, DD/MM/YYYY
    #[arg(long, value_parser = date_arg)]
    start_after: Option<NaiveDate>,
    /// Due on or before, DD/MM/YYYY
    #[arg(long, value_parser = date_arg)]
    due_before: Option<NaiveDate>,
    #[arg(long, default_value = "1")]
    page: usize,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: SearchArgs) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "search");

    let filter = ListingFilter {
        keyword: args.keyword,
        job_types: args.job_types,
        city: args.city,
        suburb: args.suburb,
        tags: args.tags,
        start_after: args.start_after,
        due_before: args.due_before,
    };
    let listings = ctx.search_service.search_listings(&filter, args.page)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }
    if listings.items.is_empty() {
        println!("No listings match.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Job ID", "Job", "Type", "Where", "Starts", "Due"]);
    for listing in &listings.items {
        let place = match &listing.suburb {
            Some(suburb) => format!("{}, {}", suburb, listing.city),
            None => listing.city.clone(),
        };
        table.add_row(vec![
            listing.job.id.to_string(),
            format!("{}\n{}", listing.job.name.bold(), listing.record_name.dimmed()),
            output::or_dash(listing.job.job_type),
            place,
            output::or_dash(listing.job.start_date.map(format_date)),
            output::or_dash(listing.job.due_date.map(format_date)),
        ]);
    }
    println!("{}", table);
    output::page_footer(&listings);

    Ok(())
}
