//! Quote command - submit, answer and compare quotes

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use renohub_core::validation::QuoteForm;
use renohub_core::{Quote, QuoteStatus};

use super::{acting_user, get_context, log_command, parse_id};
use crate::output;

#[derive(Subcommand)]
pub enum QuoteCommands {
    /// Quote for a posted job
    Submit {
        /// Job id
        job: String,
        #[arg(long)]
        price: String,
        /// Estimated working days
        #[arg(long)]
        days: String,
        #[arg(long)]
        description: String,
        /// Contact email (email or phone is required)
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Accept a quote on one of your jobs; other pending quotes are declined
    Accept { id: String },
    /// Decline a quote on one of your jobs
    Reject { id: String },
    /// Withdraw a pending quote you sent
    Retract { id: String },
    /// Quotes received on your jobs, or sent with --sent
    List {
        #[arg(long, conflicts_with = "job")]
        sent: bool,
        /// Only quotes on this job
        #[arg(long)]
        job: Option<String>,
        /// pending, accepted or rejected
        #[arg(long)]
        status: Option<QuoteStatus>,
        #[arg(long, default_value = "1")]
        page: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare the tradies behind two quotes
    Compare {
        first: String,
        second: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_quotes(quotes: &[Quote]) {
    let mut table = output::create_table();
    table.set_header(vec!["ID", "Job", "Price", "Days", "Status", "Contact"]);
    for quote in quotes {
        let contact = quote
            .email
            .clone()
            .or_else(|| quote.phone.clone())
            .unwrap_or_else(|| "-".to_string());
        let status = match quote.status {
            QuoteStatus::Pending => quote.status.to_string().yellow().to_string(),
            QuoteStatus::Accepted => quote.status.to_string().green().to_string(),
            QuoteStatus::Rejected => quote.status.to_string().dimmed().to_string(),
        };
        table.add_row(vec![
            quote.id.to_string(),
            quote.job_id.to_string(),
            output::money(quote.price),
            quote.estimated_days.to_string(),
            status,
            contact,
        ]);
    }
    println!("{}", table);
}

fn mark(better: bool) -> String {
    if better {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

pub fn run(command: QuoteCommands, acting_as: Option<&str>) -> Result<()> {
    let ctx = get_context()?;
    let user = acting_user(&ctx, acting_as)?;

    match command {
        QuoteCommands::Submit {
            job,
            price,
            days,
            description,
            email,
            phone,
        } => {
            log_command(&ctx, "quote submit");
            let form = QuoteForm {
                price,
                estimated_days: days,
                description,
                email: email.unwrap_or_default(),
                phone: phone.unwrap_or_default(),
            };
            let quote = ctx.quote_service.submit_quote(user.id, parse_id(&job)?, &form)?;
            output::success(&format!("Quote sent ({})", quote.id));
        }
        QuoteCommands::Accept { id } => {
            log_command(&ctx, "quote accept");
            let quote = ctx.quote_service.accept_quote(user.id, parse_id(&id)?)?;
            output::success(&format!("Accepted quote of {}", output::money(quote.price)));
        }
        QuoteCommands::Reject { id } => {
            log_command(&ctx, "quote reject");
            ctx.quote_service.reject_quote(user.id, parse_id(&id)?)?;
            output::success("Quote declined");
        }
        QuoteCommands::Retract { id } => {
            log_command(&ctx, "quote retract");
            ctx.quote_service.retract_quote(user.id, parse_id(&id)?)?;
            output::success("Quote withdrawn");
        }
        QuoteCommands::List {
            sent,
            job,
            status,
            page,
            json,
        } => {
            if let Some(job) = job {
                let quotes: Vec<Quote> = ctx
                    .quote_service
                    .quotes_for_job(user.id, parse_id(&job)?)?
                    .into_iter()
                    .filter(|q| status.map_or(true, |s| q.status == s))
                    .collect();
                if json {
                    println!("{}", serde_json::to_string_pretty(&quotes)?);
                } else if quotes.is_empty() {
                    println!("No quotes found.");
                } else {
                    print_quotes(&quotes);
                }
                return Ok(());
            }

            let quotes = if sent {
                ctx.quote_service.quotes_sent(user.id, status, page)?
            } else {
                ctx.quote_service.quotes_received(user.id, status, page)?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&quotes)?);
                return Ok(());
            }
            if quotes.items.is_empty() {
                println!("No quotes found.");
                return Ok(());
            }
            print_quotes(&quotes.items);
            output::page_footer(&quotes);
        }
        QuoteCommands::Compare {
            first,
            second,
            json,
        } => {
            let first = ctx.quote_service.quote(user.id, parse_id(&first)?)?;
            let second = ctx.quote_service.quote(user.id, parse_id(&second)?)?;
            let comparison = ctx.comparison_service.compare_quotes(&first, &second)?;
            let a = ctx.comparison_service.tradie_profile(first.tradie_id)?;
            let b = ctx.comparison_service.tradie_profile(second.tradie_id)?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "first": a,
                        "second": b,
                        "first_at_least_as_good": comparison,
                    }))?
                );
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["", "First", "Second", "First wins"]);
            table.add_row(vec![
                "Rating".to_string(),
                format!("{:.1}", a.average_rating),
                format!("{:.1}", b.average_rating),
                mark(comparison.rating),
            ]);
            table.add_row(vec![
                "Price".to_string(),
                output::money(first.price),
                output::money(second.price),
                mark(comparison.price),
            ]);
            table.add_row(vec![
                "Completed jobs".to_string(),
                a.completed_jobs.to_string(),
                b.completed_jobs.to_string(),
                mark(comparison.completed_jobs),
            ]);
            table.add_row(vec![
                "Estimated days".to_string(),
                first.estimated_days.to_string(),
                second.estimated_days.to_string(),
                mark(comparison.estimated_time),
            ]);
            table.add_row(vec![
                "Efficiency".to_string(),
                format!("{:.2}", a.efficiency),
                format!("{:.2}", b.efficiency),
                mark(comparison.efficiency),
            ]);
            println!("{}", table);
        }
    }

    Ok(())
}
