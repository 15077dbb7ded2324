//! Job form validation

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::common::{date_in_the_past, is_valid_name, optional, parse_date, required_text};
use super::{Field, ValidationErrors};
use crate::domain::JobType;

pub const NAME_MAX: usize = 255;
pub const DESCRIPTION_MAX: usize = 512;

pub const JOB_NAME_INVALID: &str =
    "Job name must only include letters, numbers, spaces, dots, commas, hyphens or apostrophes";
pub const JOB_TYPE_INVALID: &str = "Job type must be one of the listed job types";
pub const START_DATE_INVALID: &str = "Start date must be a valid date in the format DD/MM/YYYY";
pub const START_DATE_PAST: &str = "Start date cannot be in the past";
pub const DUE_DATE_INVALID: &str = "Due date must be a valid date in the format DD/MM/YYYY";
pub const DUE_DATE_PAST: &str = "Due date cannot be in the past";
pub const DUE_DATE_BEFORE_START: &str = "Due date must be after the start date";

/// Job details as entered
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobForm {
    pub name: String,
    pub description: String,
    /// Empty for no type
    #[serde(default)]
    pub job_type: String,
    /// `DD/MM/YYYY` or empty
    #[serde(default)]
    pub start_date: String,
    /// `DD/MM/YYYY` or empty
    #[serde(default)]
    pub due_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedJob {
    pub name: String,
    pub description: String,
    pub job_type: Option<JobType>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// How dates relative to today are judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRule {
    /// New jobs: no date may be in the past
    Create,
    /// Edits: a past date is accepted only if it is unchanged
    Edit {
        start: Option<NaiveDate>,
        due: Option<NaiveDate>,
    },
}

impl DateRule {
    fn allows_past_start(&self, date: NaiveDate) -> bool {
        matches!(self, DateRule::Edit { start: Some(s), .. } if *s == date)
    }

    fn allows_past_due(&self, date: NaiveDate) -> bool {
        matches!(self, DateRule::Edit { due: Some(d), .. } if *d == date)
    }
}

pub fn validate_job(
    form: &JobForm,
    rule: DateRule,
    today: NaiveDate,
) -> Result<ParsedJob, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = required_text(&mut errors, Field::Name, &form.name, "Job name", NAME_MAX);
    if let Some(n) = &name {
        if !is_valid_name(n) {
            errors.add(Field::Name, JOB_NAME_INVALID);
        }
    }

    let description = required_text(
        &mut errors,
        Field::Description,
        &form.description,
        "Job description",
        DESCRIPTION_MAX,
    );

    let job_type = match optional(&form.job_type) {
        None => None,
        Some(raw) => match raw.parse::<JobType>() {
            Ok(t) => Some(t),
            Err(_) => {
                errors.add(Field::JobType, JOB_TYPE_INVALID);
                None
            }
        },
    };

    let start_date = match optional(&form.start_date) {
        None => None,
        Some(raw) => match parse_date(raw) {
            None => {
                errors.add(Field::StartDate, START_DATE_INVALID);
                None
            }
            Some(date) => {
                if date_in_the_past(date, today) && !rule.allows_past_start(date) {
                    errors.add(Field::StartDate, START_DATE_PAST);
                }
                Some(date)
            }
        },
    };

    let due_date = match optional(&form.due_date) {
        None => None,
        Some(raw) => match parse_date(raw) {
            None => {
                errors.add(Field::DueDate, DUE_DATE_INVALID);
                None
            }
            Some(date) => {
                if date_in_the_past(date, today) && !rule.allows_past_due(date) {
                    errors.add(Field::DueDate, DUE_DATE_PAST);
                }
                Some(date)
            }
        },
    };

    if let (Some(start), Some(due)) = (start_date, due_date) {
        if due <= start {
            errors.add(Field::DueDate, DUE_DATE_BEFORE_START);
        }
    }

    match (name, description) {
        (Some(name), Some(description)) if errors.is_empty() => Ok(ParsedJob {
            name,
            description,
            job_type,
            start_date,
            due_date,
        }),
        _ => Err(errors),
    }
}
