//! Expense form validation

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{money_error, optional, parse_date, parse_money, required_text};
use super::{Field, ValidationErrors};
use crate::domain::ExpenseCategory;

pub const NAME_MAX: usize = 64;

pub const CATEGORY_EMPTY: &str = "Expense category must be selected";
pub const CATEGORY_INVALID: &str = "Expense category must be one of the listed categories";
pub const DATE_EMPTY: &str = "Expense date cannot be empty";
pub const DATE_INVALID: &str = "Expense date must be a valid date in the format DD/MM/YYYY";
pub const DATE_FUTURE: &str = "Expense date cannot be in the future";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseForm {
    pub name: String,
    pub cost: String,
    pub category: String,
    /// `DD/MM/YYYY`
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExpense {
    pub name: String,
    pub cost: Decimal,
    pub category: ExpenseCategory,
    pub date: NaiveDate,
}

pub fn validate_expense(
    form: &ExpenseForm,
    today: NaiveDate,
) -> Result<ParsedExpense, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = required_text(&mut errors, Field::Name, &form.name, "Expense name", NAME_MAX);

    let cost = match parse_money(&form.cost) {
        Ok(cost) => Some(cost),
        Err(e) => {
            money_error(&mut errors, Field::Cost, "Cost", e);
            None
        }
    };

    let category = match optional(&form.category) {
        None => {
            errors.add(Field::Category, CATEGORY_EMPTY);
            None
        }
        Some(raw) => match raw.parse::<ExpenseCategory>() {
            Ok(c) => Some(c),
            Err(_) => {
                errors.add(Field::Category, CATEGORY_INVALID);
                None
            }
        },
    };

    let date = match optional(&form.date) {
        None => {
            errors.add(Field::Date, DATE_EMPTY);
            None
        }
        Some(raw) => match parse_date(raw) {
            None => {
                errors.add(Field::Date, DATE_INVALID);
                None
            }
            Some(date) if date > today => {
                errors.add(Field::Date, DATE_FUTURE);
                None
            }
            Some(date) => Some(date),
        },
    };

    match (name, cost, category, date) {
        (Some(name), Some(cost), Some(category), Some(date)) => Ok(ParsedExpense {
            name,
            cost,
            category,
            date,
        }),
        _ => Err(errors),
    }
}
