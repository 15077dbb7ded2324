//! Mail adapters
//!
//! - `OutboxMailer` drops each message as a JSON file into an outbox
//!   directory, for a relay or a developer to pick up
//! - `RecordingMailer` keeps messages in memory (tests, dry runs)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::ports::{Email, Mailer};

#[derive(Serialize)]
struct OutboxMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
    queued_at: String,
}

/// File-drop mailer
#[derive(Debug)]
pub struct OutboxMailer {
    dir: PathBuf,
    from: String,
}

impl OutboxMailer {
    pub fn new(dir: &Path, from: impl Into<String>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            from: from.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, email: &Email) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Mail(format!("Cannot create outbox: {}", e)))?;

        let now = Utc::now();
        let message = OutboxMessage {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            body: &email.body,
            queued_at: now.to_rfc3339(),
        };
        let filename = format!("{}_{}.json", now.format("%Y%m%dT%H%M%S%.3f"), Uuid::new_v4());
        let content = serde_json::to_string_pretty(&message)?;

        fs::write(self.dir.join(filename), content)
            .map_err(|e| Error::Mail(format!("Cannot write to outbox: {}", e)))
    }
}

/// In-memory mailer; can be switched to fail every send
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages sent so far
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Messages sent to one address
    pub fn sent_to(&self, to: &str) -> Vec<Email> {
        self.sent()
            .into_iter()
            .filter(|e| e.to.eq_ignore_ascii_case(to))
            .collect()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &Email) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Mail("Mail transport unavailable".to_string()));
        }
        self.sent
            .lock()
            .map_err(|e| Error::Mail(format!("Lock poisoned: {}", e)))?
            .push(email.clone());
        Ok(())
    }
}
