//! Rating and password reset token models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An owner's 1-5 star rating of the tradie who completed a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub rater_id: Uuid,
    pub rated_id: Uuid,
    pub job_id: Uuid,
    pub value: u8,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(rater_id: Uuid, rated_id: Uuid, job_id: Uuid, value: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            rater_id,
            rated_id,
            job_id,
            value,
            created_at: Utc::now(),
        }
    }
}

/// Single-use token emailed for a password reset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordToken {
    pub token: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl ResetPasswordToken {
    pub fn issue(user_id: Uuid, ttl: Duration) -> Self {
        Self {
            token: Uuid::new_v4(),
            user_id,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
