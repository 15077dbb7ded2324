//! Form validation
//!
//! Validators take forms exactly as a user typed them (strings) and either
//! produce typed values or every violated rule at once. Messages are keyed
//! by [`Field`], so front ends look errors up by field instead of searching
//! a joined message string.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod common;
pub mod expense;
pub mod job;
pub mod location;
pub mod quote;
pub mod record;
pub mod tag;
pub mod user;

pub use expense::{validate_expense, ExpenseForm, ParsedExpense};
pub use job::{validate_job, DateRule, JobForm, ParsedJob};
pub use location::{validate_location, LocationForm};
pub use quote::{validate_quote, ParsedQuote, QuoteForm};
pub use record::{validate_record, validate_room_name, ParsedRecord, RecordForm};
pub use tag::{normalize_tag, validate_tag};
pub use user::{
    validate_new_password, validate_profile, validate_registration, ParsedProfile,
    ParsedRegistration, PasswordForm, ProfileForm, RegistrationForm,
};

/// Form field an error message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Description,
    JobType,
    StartDate,
    DueDate,
    Status,
    Cost,
    Category,
    Date,
    Price,
    EstimatedTime,
    Email,
    Phone,
    StreetAddress,
    Suburb,
    City,
    Postcode,
    Country,
    Tag,
    Room,
    FirstName,
    LastName,
    Password,
    ConfirmPassword,
    OldPassword,
    Code,
    Rating,
    Image,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Description => "description",
            Field::JobType => "job_type",
            Field::StartDate => "start_date",
            Field::DueDate => "due_date",
            Field::Status => "status",
            Field::Cost => "cost",
            Field::Category => "category",
            Field::Date => "date",
            Field::Price => "price",
            Field::EstimatedTime => "estimated_time",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::StreetAddress => "street_address",
            Field::Suburb => "suburb",
            Field::City => "city",
            Field::Postcode => "postcode",
            Field::Country => "country",
            Field::Tag => "tag",
            Field::Room => "room",
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::Password => "password",
            Field::ConfirmPassword => "confirm_password",
            Field::OldPassword => "old_password",
            Field::Code => "code",
            Field::Rating => "rating",
            Field::Image => "image",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single violated rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Ordered collection of violated rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: Field, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Append another set, keeping order
    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Messages for one field, in the order they were raised
    pub fn for_field(&self, field: Field) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// First message for one field
    pub fn first(&self, field: Field) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn has(&self, field: Field) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Exact message check on one field
    pub fn contains(&self, field: Field, message: &str) -> bool {
        self.errors
            .iter()
            .any(|e| e.field == field && e.message == message)
    }

    /// Messages grouped by field name
    pub fn by_field(&self) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for e in &self.errors {
            map.entry(e.field.as_str().to_string())
                .or_default()
                .push(e.message.clone());
        }
        map
    }

    /// `Ok(value)` when no rule was violated
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_by_field_not_substring() {
        let mut errors = ValidationErrors::new();
        errors.add(Field::DueDate, "Due date cannot be empty");
        errors.add(Field::StartDate, "Date cannot be empty");

        assert_eq!(errors.for_field(Field::StartDate), vec!["Date cannot be empty"]);
        assert_eq!(errors.for_field(Field::DueDate), vec!["Due date cannot be empty"]);
        assert!(errors.for_field(Field::Name).is_empty());
    }

    #[test]
    fn test_display_joins_in_order() {
        let mut errors = ValidationErrors::new();
        errors.add(Field::Name, "first");
        errors.add(Field::Description, "second");
        assert_eq!(errors.to_string(), "first; second");
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ValidationErrors::new().into_result(3), Ok(3));
        let errors = ValidationErrors::single(Field::Cost, "bad");
        assert!(errors.into_result(3).is_err());
    }

    #[test]
    fn test_by_field_groups_messages() {
        let mut errors = ValidationErrors::new();
        errors.add(Field::Password, "too short");
        errors.add(Field::Password, "needs a digit");
        let grouped = errors.by_field();
        assert_eq!(grouped["password"].len(), 2);
    }
}
