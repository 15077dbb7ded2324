//! Job command - jobs on a renovation record, posting, ratings and portfolio

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use renohub_core::validation::common::format_date;
use renohub_core::validation::JobForm;
use renohub_core::{Job, JobStatus};

use super::{acting_user, get_context, log_command, parse_id};
use crate::output;

#[derive(Subcommand)]
pub enum JobCommands {
    /// Add a job to a renovation record
    Create {
        /// Renovation record id
        record: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        /// Job type, e.g. Plumbing
        #[arg(long = "type")]
        job_type: Option<String>,
        /// Start date, DD/MM/YYYY
        #[arg(long)]
        start: Option<String>,
        /// Due date, DD/MM/YYYY
        #[arg(long)]
        due: Option<String>,
        /// Room ids the job covers
        #[arg(long = "room", value_delimiter = ',')]
        rooms: Vec<String>,
    },
    /// List the jobs on a record
    List {
        /// Renovation record id
        record: String,
        /// Only jobs with this status
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long, default_value = "1")]
        page: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Advertise a job for quotes
    Post { id: String },
    /// Take a job off the listings
    Unpost { id: String },
    /// Change a job's status
    Status {
        id: String,
        /// Not Started, In Progress, Blocked, Completed or Cancelled
        status: JobStatus,
    },
    /// Attach an image to a job
    Image { id: String, file: PathBuf },
    /// Rate the tradie hired for a completed job
    Rate {
        id: String,
        /// 1 to 5
        value: u8,
    },
    /// Show a tradie portfolio, or add and remove jobs from your own
    Portfolio {
        /// Completed job to add
        #[arg(long, conflicts_with = "remove")]
        add: Option<String>,
        /// Job to take out
        #[arg(long)]
        remove: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn dates(job: &Job) -> String {
    match (job.start_date, job.due_date) {
        (Some(start), Some(due)) => format!("{} - {}", format_date(start), format_date(due)),
        (Some(start), None) => format!("from {}", format_date(start)),
        (None, Some(due)) => format!("by {}", format_date(due)),
        (None, None) => "-".to_string(),
    }
}

fn print_jobs(jobs: &[Job]) {
    let mut table = output::create_table();
    table.set_header(vec!["ID", "Name", "Type", "Status", "Dates", "Posted"]);
    for job in jobs {
        table.add_row(vec![
            job.id.to_string(),
            job.name.clone(),
            output::or_dash(job.job_type),
            job.status.to_string(),
            dates(job),
            if job.is_posted { "yes".green().to_string() } else { "no".to_string() },
        ]);
    }
    println!("{}", table);
}

pub fn run(command: JobCommands, acting_as: Option<&str>) -> Result<()> {
    let ctx = get_context()?;

    match command {
        JobCommands::Create {
            record,
            name,
            description,
            job_type,
            start,
            due,
            rooms,
        } => {
            log_command(&ctx, "job create");
            let user = acting_user(&ctx, acting_as)?;
            let room_ids = rooms
                .iter()
                .map(|r| parse_id(r))
                .collect::<Result<Vec<_>>>()?;
            let form = JobForm {
                name,
                description,
                job_type: job_type.unwrap_or_default(),
                start_date: start.unwrap_or_default(),
                due_date: due.unwrap_or_default(),
            };
            let job = ctx
                .job_service
                .create_job(user.id, parse_id(&record)?, &form, &room_ids)?;
            output::success(&format!("Created job '{}' ({})", job.name, job.id));
        }
        JobCommands::List {
            record,
            status,
            page,
            json,
        } => {
            let user = acting_user(&ctx, acting_as)?;
            let jobs = ctx
                .job_service
                .list_jobs(user.id, parse_id(&record)?, status, page)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
                return Ok(());
            }
            if jobs.items.is_empty() {
                println!("No jobs found.");
                return Ok(());
            }
            print_jobs(&jobs.items);
            output::page_footer(&jobs);
        }
        JobCommands::Post { id } => {
            log_command(&ctx, "job post");
            let user = acting_user(&ctx, acting_as)?;
            let job = ctx.job_service.post_job(user.id, parse_id(&id)?)?;
            output::success(&format!("'{}' is now listed", job.name));
        }
        JobCommands::Unpost { id } => {
            log_command(&ctx, "job unpost");
            let user = acting_user(&ctx, acting_as)?;
            let job = ctx.job_service.unpost_job(user.id, parse_id(&id)?)?;
            output::success(&format!("'{}' is no longer listed", job.name));
        }
        JobCommands::Status { id, status } => {
            log_command(&ctx, "job status");
            let user = acting_user(&ctx, acting_as)?;
            let job = ctx.job_service.set_status(user.id, parse_id(&id)?, status)?;
            output::success(&format!("'{}' is {}", job.name, job.status));
        }
        JobCommands::Image { id, file } => {
            log_command(&ctx, "job image");
            let user = acting_user(&ctx, acting_as)?;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file.to_string_lossy();
            let job = ctx
                .job_service
                .set_job_image(user.id, parse_id(&id)?, &filename, &bytes)?;
            output::success(&format!("Image saved for '{}'", job.name));
        }
        JobCommands::Rate { id, value } => {
            log_command(&ctx, "job rate");
            let user = acting_user(&ctx, acting_as)?;
            let rating = ctx.rating_service.rate(user.id, parse_id(&id)?, value)?;
            let average = ctx.comparison_service.average_rating(rating.rated_id)?;
            output::success(&format!(
                "Rated {}/5. The tradie now averages {:.1}",
                rating.value, average
            ));
        }
        JobCommands::Portfolio {
            add,
            remove,
            page,
            json,
        } => {
            let user = acting_user(&ctx, acting_as)?;
            if let Some(id) = add {
                log_command(&ctx, "job portfolio add");
                ctx.job_service.add_to_portfolio(user.id, parse_id(&id)?)?;
                output::success("Added to your portfolio");
                return Ok(());
            }
            if let Some(id) = remove {
                log_command(&ctx, "job portfolio remove");
                ctx.job_service.remove_from_portfolio(user.id, parse_id(&id)?)?;
                output::success("Removed from your portfolio");
                return Ok(());
            }

            let jobs = ctx.job_service.portfolio(user.id, page)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
                return Ok(());
            }
            if jobs.items.is_empty() {
                println!("Your portfolio is empty.");
                return Ok(());
            }
            print_jobs(&jobs.items);
            output::page_footer(&jobs);
        }
    }

    Ok(())
}
