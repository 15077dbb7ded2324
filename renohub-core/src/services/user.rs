//! User service - registration, verification, passwords and profiles

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::config::SchedulingSettings;
use crate::domain::result::{Error, Result};
use crate::domain::{ResetPasswordToken, User};
use crate::ports::Repository;
use crate::services::logging::{LogEvent, LoggingService};
use crate::services::notification::NotificationService;
use crate::services::password::PasswordHasherService;
use crate::services::scheduler::DelayedTaskScheduler;
use crate::services::storage::{ImageKind, ImageStore};
use crate::validation::{
    validate_new_password, validate_profile, validate_registration, Field, PasswordForm,
    ProfileForm, RegistrationForm, ValidationErrors,
};

pub const CODE_INCORRECT: &str = "Verification code is incorrect";
pub const OLD_PASSWORD_INCORRECT: &str = "Your old password is incorrect";
pub const LOGIN_FAILED: &str = "The email address is unknown, or the password is invalid";

/// What a purge sweep removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub reset_tokens: usize,
    pub unverified_users: usize,
}

/// Six decimal digits, zero padded
fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
}

fn to_std(d: Duration) -> std::time::Duration {
    d.to_std().unwrap_or_default()
}

/// Delayed task body: drop the account unless it was verified meanwhile
fn purge_if_unverified(
    repository: Arc<dyn Repository>,
    user_id: Uuid,
) -> impl FnOnce() -> Result<()> + Send + 'static {
    move || match repository.get_user(user_id)? {
        Some(u) if !u.verified => repository.delete_user(user_id),
        _ => Ok(()),
    }
}

pub struct UserService {
    repository: Arc<dyn Repository>,
    hasher: PasswordHasherService,
    notifications: Arc<NotificationService>,
    scheduler: Arc<DelayedTaskScheduler>,
    images: Arc<ImageStore>,
    scheduling: SchedulingSettings,
    logger: Arc<LoggingService>,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn Repository>,
        hasher: PasswordHasherService,
        notifications: Arc<NotificationService>,
        scheduler: Arc<DelayedTaskScheduler>,
        images: Arc<ImageStore>,
        scheduling: SchedulingSettings,
        logger: Arc<LoggingService>,
    ) -> Self {
        Self {
            repository,
            hasher,
            notifications,
            scheduler,
            images,
            scheduling,
            logger,
        }
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.repository
            .get_user(id)?
            .ok_or_else(|| Error::not_found(format!("User {}", id)))
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.repository.get_user_by_email(&User::normalize_email(email))
    }

    /// Create an unverified account and email its verification code
    ///
    /// If the email cannot be sent the account is removed again. The
    /// account is purged after `unverified_user_ttl` unless verified.
    pub fn register(&self, form: &RegistrationForm) -> Result<User> {
        let email_taken = self.find_by_email(&form.email)?.is_some();
        let parsed = validate_registration(form, email_taken)?;

        let hash = self.hasher.hash(&parsed.password)?;
        let mut user = User::new(parsed.first_name, parsed.last_name, &parsed.email, hash);
        let code = generate_code();
        user.verification_code = Some(code.clone());
        self.repository.save_user(&user)?;

        if let Err(e) = self.notifications
            .send_registration_code(&user, &code, self.scheduling.unverified_user_ttl()) {
            self.repository.delete_user(user.id)?;
            return Err(e);
        }

        self.scheduler.schedule(
            "purge_unverified_user",
            to_std(self.scheduling.unverified_user_ttl()),
            purge_if_unverified(Arc::clone(&self.repository), user.id),
        );

        self.logger
            .emit(LogEvent::new("user_registered").with_entity("user", user.id));
        Ok(user)
    }

    /// Mark an account verified when `code` matches
    pub fn verify_registration(&self, email: &str, code: &str) -> Result<User> {
        let mut user = self
            .find_by_email(email)?
            .ok_or_else(|| Error::not_found("No account is waiting for verification"))?;

        if user.verified {
            return Err(Error::conflict("Account is already verified"));
        }
        if user.created_at + self.scheduling.unverified_user_ttl() <= Utc::now() {
            self.repository.delete_user(user.id)?;
            return Err(Error::not_found("Verification period has expired"));
        }
        if user.verification_code.as_deref() != Some(code.trim()) {
            return Err(Error::invalid(Field::Code, CODE_INCORRECT));
        }

        user.verified = true;
        user.verification_code = None;
        self.repository.save_user(&user)?;
        Ok(user)
    }

    /// Verified account whose password matches
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        match self.find_by_email(email)? {
            Some(user) if user.verified && self.hasher.verify(password, &user.password_hash) => {
                Ok(user)
            }
            _ => Err(Error::forbidden(LOGIN_FAILED)),
        }
    }

    /// Issue a reset token and email its link
    ///
    /// Unknown addresses succeed silently, revealing nothing about which accounts exist.
    pub fn request_password_reset(&self, email: &str) -> Result<()> {
        let user = match self.find_by_email(email)? {
            Some(user) => user,
            None => return Ok(()),
        };

        let token = ResetPasswordToken::issue(user.id, self.scheduling.reset_token_ttl());
        self.repository.save_reset_token(&token)?;

        if let Err(e) = self.notifications
            .send_password_reset(&user, token.token, self.scheduling.reset_token_ttl()) {
            self.repository.delete_reset_token(token.token)?;
            return Err(e);
        }

        let repository = Arc::clone(&self.repository);
        let token_id = token.token;
        self.scheduler.schedule(
            "expire_reset_token",
            to_std(self.scheduling.reset_token_ttl()),
            move || repository.delete_reset_token(token_id).map(|_| ()),
        );
        Ok(())
    }

    /// Set a new password with a reset token; the token is consumed
    pub fn reset_password(&self, token: Uuid, form: &PasswordForm) -> Result<()> {
        let stored = self
            .repository
            .get_reset_token(token)?
            .ok_or_else(|| Error::not_found("Reset link is invalid or has expired"))?;
        if stored.is_expired(Utc::now()) {
            self.repository.delete_reset_token(token)?;
            return Err(Error::not_found("Reset link is invalid or has expired"));
        }

        let mut user = self.get_user(stored.user_id)?;
        let password =
            validate_new_password(form, &user.first_name, user.last_name.as_deref(), &user.email)?;

        user.password_hash = self.hasher.hash(&password)?;
        self.repository.save_user(&user)?;
        self.repository.delete_reset_token(token)?;
        Ok(())
    }

    pub fn change_password(&self, user_id: Uuid, old_password: &str, form: &PasswordForm) -> Result<()> {
        let mut user = self.get_user(user_id)?;
        let mut errors = ValidationErrors::new();

        if !self.hasher.verify(old_password, &user.password_hash) {
            errors.add(Field::OldPassword, OLD_PASSWORD_INCORRECT);
        }
        let password = validate_new_password(form, &user.first_name, user.last_name.as_deref(), &user.email);
        let password = match password {
            Ok(p) => Some(p),
            Err(e) => {
                errors.extend(e);
                None
            }
        };

        match password {
            Some(p) if errors.is_empty() => {
                user.password_hash = self.hasher.hash(&p)?;
                self.repository.save_user(&user)?;
                Ok(())
            }
            _ => Err(errors.into()),
        }
    }

    pub fn update_profile(&self, user_id: Uuid, form: &ProfileForm) -> Result<User> {
        let mut user = self.get_user(user_id)?;
        let email_taken = matches!(
            self.find_by_email(&form.email)?,
            Some(other) if other.id != user_id
        );
        let parsed = validate_profile(form, email_taken)?;

        user.first_name = parsed.first_name;
        user.last_name = parsed.last_name;
        user.email = User::normalize_email(&parsed.email);
        user.city = parsed.city;
        user.suburb = parsed.suburb;
        self.repository.save_user(&user)?;
        Ok(user)
    }

    /// Store a profile picture, replacing the previous one
    pub fn set_profile_image(&self, user_id: Uuid, filename: &str, bytes: &[u8]) -> Result<User> {
        let mut user = self.get_user(user_id)?;
        let previous = user.profile_image.clone();
        self.images.replace(
            ImageKind::Profile,
            user_id,
            filename,
            bytes,
            previous.as_deref(),
            |stored| {
                user.profile_image = Some(stored);
                self.repository.save_user(&user)
            },
        )?;
        Ok(user)
    }

    /// Remove expired reset tokens and unverified accounts past their TTL
    ///
    /// Covers delayed tasks lost when a previous process exited.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeReport> {
        let reset_tokens = self.repository.delete_expired_reset_tokens(now)?;

        let cutoff = now - self.scheduling.unverified_user_ttl();
        let stale = self.repository.list_unverified_users_before(cutoff)?;
        for user in &stale {
            self.repository.delete_user(user.id)?;
        }

        let report = PurgeReport {
            reset_tokens,
            unverified_users: stale.len(),
        };
        if report != PurgeReport::default() {
            self.logger.emit(
                LogEvent::new("expired_purged").with_error_details(format!(
                    "reset_tokens={} unverified_users={}",
                    report.reset_tokens, report.unverified_users
                )),
            );
        }
        Ok(report)
    }
}
