//! User command - registration, verification and password recovery

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use renohub_core::validation::{PasswordForm, RegistrationForm};

use super::{acting_user, get_context, log_command, parse_id, password_or_prompt};
use crate::output;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create an account; a verification code is emailed
    Register {
        #[arg(long)]
        first_name: String,
        /// Omit for single-name accounts
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long, env = "RENOHUB_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Confirm an account with its emailed code
    Verify {
        email: String,
        code: String,
    },
    /// Email a password reset link
    ResetRequest {
        email: String,
    },
    /// Set a new password with a reset token
    Reset {
        token: String,
        #[arg(long, env = "RENOHUB_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Show the acting account's tradie profile
    Profile {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: UserCommands, acting_as: Option<&str>) -> Result<()> {
    let ctx = get_context()?;

    match command {
        UserCommands::Register {
            first_name,
            last_name,
            email,
            password,
        } => {
            log_command(&ctx, "user register");
            let (password, confirm_password) = password_or_prompt(password)?;
            let form = RegistrationForm {
                first_name,
                no_last_name: last_name.is_none(),
                last_name: last_name.unwrap_or_default(),
                email,
                password,
                confirm_password,
            };
            let user = ctx.user_service.register(&form)?;
            output::success(&format!("Registered {}", user.email));
            output::info("A verification code has been sent to that address.");
        }
        UserCommands::Verify { email, code } => {
            log_command(&ctx, "user verify");
            let user = ctx.user_service.verify_registration(&email, &code)?;
            output::success(&format!("{} is verified", user.email));
        }
        UserCommands::ResetRequest { email } => {
            log_command(&ctx, "user reset-request");
            ctx.user_service.request_password_reset(&email)?;
            output::info("If that address has an account, a reset link is on its way.");
        }
        UserCommands::Reset { token, password } => {
            log_command(&ctx, "user reset");
            let token = parse_id(&token)?;
            let (password, confirm_password) = password_or_prompt(password)?;
            let form = PasswordForm {
                password,
                confirm_password,
            };
            ctx.user_service.reset_password(token, &form)?;
            output::success("Password updated");
        }
        UserCommands::Profile { json } => {
            let user = acting_user(&ctx, acting_as)?;
            let profile = ctx.comparison_service.tradie_profile(user.id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
                return Ok(());
            }

            println!("{}", user.full_name().bold());
            let mut table = output::create_table();
            table.add_row(vec!["Email", user.email.as_str()]);
            table.add_row(vec![
                "Location".to_string(),
                match (&user.suburb, &user.city) {
                    (Some(suburb), Some(city)) => format!("{}, {}", suburb, city),
                    (None, Some(city)) => city.clone(),
                    _ => "-".to_string(),
                },
            ]);
            table.add_row(vec![
                "Average rating".to_string(),
                format!("{:.1} ({} ratings)", profile.average_rating, profile.rating_count),
            ]);
            table.add_row(vec!["Completed jobs".to_string(), profile.completed_jobs.to_string()]);
            table.add_row(vec!["Efficiency".to_string(), format!("{:.2}", profile.efficiency)]);
            println!("{}", table);
        }
    }

    Ok(())
}
