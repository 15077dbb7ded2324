//! Purge command - sweep expired reset tokens and unverified accounts

use anyhow::Result;

use super::{get_context, log_command};
use crate::output;

pub fn run(json: bool) -> Result<()> {
    // Opening the context performs the sweep
    let ctx = get_context()?;
    log_command(&ctx, "purge");
    let report = &ctx.purged;

    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if report.reset_tokens == 0 && report.unverified_users == 0 {
        output::info("Nothing to purge.");
    } else {
        output::success(&format!(
            "Removed {} expired reset token(s) and {} unverified account(s)",
            report.reset_tokens, report.unverified_users
        ));
    }

    Ok(())
}
