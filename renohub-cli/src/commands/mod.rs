//! CLI command implementations

pub mod expense;
pub mod job;
pub mod logs;
pub mod purge;
pub mod quote;
pub mod record;
pub mod search;
pub mod status;
pub mod user;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use dialoguer::Password;
use renohub_core::services::{EntryPoint, LogEvent};
use renohub_core::validation::common::parse_date;
use renohub_core::{RenohubContext, User};
use uuid::Uuid;

/// Get the renohub directory from environment or default
pub fn get_renohub_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("RENOHUB_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".renohub"))
        .ok_or_else(|| anyhow!("Could not find home directory; set RENOHUB_DIR"))
}

/// Get or create renohub context
pub fn get_context() -> Result<RenohubContext> {
    let renohub_dir = get_renohub_dir()?;
    RenohubContext::new(&renohub_dir, EntryPoint::Cli)
        .context("Failed to initialize renohub context")
}

/// Record that a command ran; logging never fails a command
pub fn log_command(ctx: &RenohubContext, command: &str) {
    ctx.logger.emit(LogEvent::new("command_run").with_command(command));
}

/// The verified account named by `--as`
pub fn acting_user(ctx: &RenohubContext, acting_as: Option<&str>) -> Result<User> {
    let email = acting_as
        .ok_or_else(|| anyhow!("This command needs an account: pass --as <email> or set RENOHUB_USER"))?;
    let user = ctx
        .user_service
        .find_by_email(email)?
        .ok_or_else(|| anyhow!("No account for {}", email))?;
    if !user.verified {
        return Err(anyhow!("Account {} is not verified yet", email));
    }
    Ok(user)
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("'{}' is not a valid id", raw))
}

/// clap value parser for DD/MM/YYYY dates
pub fn date_arg(raw: &str) -> std::result::Result<chrono::NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("'{}' is not a DD/MM/YYYY date", raw))
}

/// Use `given` or prompt twice without echo
pub fn password_or_prompt(given: Option<String>) -> Result<(String, String)> {
    if let Some(password) = given {
        return Ok((password.clone(), password));
    }
    let password = Password::new().with_prompt("Password").interact()?;
    let confirm = Password::new().with_prompt("Confirm password").interact()?;
    Ok((password, confirm))
}
