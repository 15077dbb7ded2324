//! Notification service - transactional emails

use std::sync::Arc;

use chrono::Duration;
use url::Url;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Job, Quote, User};
use crate::ports::{Email, Mailer};
use crate::services::logging::{LogEvent, LoggingService};

/// "1 minute", "10 minutes"
fn lifetime(ttl: Duration) -> String {
    match ttl.num_minutes() {
        1 => "1 minute".to_string(),
        n => format!("{} minutes", n),
    }
}

pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
    base_url: String,
    logger: Arc<LoggingService>,
}

impl NotificationService {
    pub fn new(mailer: Arc<dyn Mailer>, base_url: &str, logger: Arc<LoggingService>) -> Self {
        Self {
            mailer,
            base_url: base_url.trim_end_matches('/').to_string(),
            logger,
        }
    }

    /// `{base_url}/reset-password?token=...`
    pub fn reset_link(&self, token: Uuid) -> Result<String> {
        let mut url = Url::parse(&format!("{}/reset-password", self.base_url))
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        url.query_pairs_mut()
            .append_pair("token", &token.to_string());
        Ok(url.to_string())
    }

    pub fn send_registration_code(&self, user: &User, code: &str, ttl: Duration) -> Result<()> {
        let body = format!(
            "Kia ora {},\n\n\
             Your Renohub verification code is {}.\n\n\
             The code expires in {}. If you did not sign up, ignore this email.",
            user.first_name,
            code,
            lifetime(ttl)
        );
        self.deliver("registration_code", Email::new(&user.email, "Verify your Renohub account", body))
    }

    pub fn send_password_reset(&self, user: &User, token: Uuid, ttl: Duration) -> Result<()> {
        let link = self.reset_link(token)?;
        let body = format!(
            "Kia ora {},\n\n\
             Reset your password here: {}\n\n\
             The link expires in {}. If you did not ask for a reset, ignore this email.",
            user.first_name,
            link,
            lifetime(ttl)
        );
        self.deliver("password_reset", Email::new(&user.email, "Reset your Renohub password", body))
    }

    pub fn send_quote_received(&self, owner: &User, job: &Job, quote: &Quote, tradie: &User) -> Result<()> {
        let body = format!(
            "Kia ora {},\n\n\
             {} sent a quote for \"{}\": ${} over {} day(s).\n\n{}",
            owner.first_name,
            tradie.full_name(),
            job.name,
            quote.price,
            quote.estimated_days,
            quote.description
        );
        self.deliver(
            "quote_received",
            Email::new(&owner.email, format!("New quote for {}", job.name), body),
        )
    }

    pub fn send_quote_accepted(&self, tradie: &User, job: &Job, quote: &Quote) -> Result<()> {
        let body = format!(
            "Kia ora {},\n\n\
             Your quote of ${} for \"{}\" has been accepted.",
            tradie.first_name, quote.price, job.name
        );
        self.deliver(
            "quote_accepted",
            Email::new(&tradie.email, format!("Quote accepted: {}", job.name), body),
        )
    }

    pub fn send_quote_rejected(&self, tradie: &User, job: &Job, quote: &Quote) -> Result<()> {
        let body = format!(
            "Kia ora {},\n\n\
             Your quote of ${} for \"{}\" was not accepted.",
            tradie.first_name, quote.price, job.name
        );
        self.deliver(
            "quote_rejected",
            Email::new(&tradie.email, format!("Quote declined: {}", job.name), body),
        )
    }

    fn deliver(&self, kind: &str, email: Email) -> Result<()> {
        self.mailer.send(&email).map_err(|e| {
            self.logger.emit(
                LogEvent::new("email_failed")
                    .with_error(e.to_string())
                    .with_error_details(kind.to_string()),
            );
            match e {
                Error::Mail(_) => e,
                other => Error::Mail(other.to_string()),
            }
        })
    }
}
