//! Mail port - outbound transactional email

use serde::{Deserialize, Serialize};

use crate::domain::result::Result;

/// A rendered plain-text email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Email delivery. Transport (SMTP, API, file drop) is the adapter's concern.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &Email) -> Result<()>;
}
