//! Expense domain model

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Material,
    Labour,
    Equipment,
    #[serde(rename = "Professional Service")]
    ProfessionalService,
    Permit,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 6] = [
        ExpenseCategory::Material,
        ExpenseCategory::Labour,
        ExpenseCategory::Equipment,
        ExpenseCategory::ProfessionalService,
        ExpenseCategory::Permit,
        ExpenseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Material => "Material",
            ExpenseCategory::Labour => "Labour",
            ExpenseCategory::Equipment => "Equipment",
            ExpenseCategory::ProfessionalService => "Professional Service",
            ExpenseCategory::Permit => "Permit",
            ExpenseCategory::Other => "Other",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ExpenseCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("Unknown expense category: {}", trimmed))
    }
}

/// Money spent on a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub job_id: Uuid,
    pub name: String,
    pub cost: Decimal,
    pub category: ExpenseCategory,
    pub date: NaiveDate,
}

impl Expense {
    pub fn new(
        job_id: Uuid,
        name: impl Into<String>,
        cost: Decimal,
        category: ExpenseCategory,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            name: name.into(),
            cost,
            category,
            date,
        }
    }
}
