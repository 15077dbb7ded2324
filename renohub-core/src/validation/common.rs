//! Shared form grammar: dates, money, names, contact details

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::{Field, ValidationErrors};

/// Display and input format for calendar dates
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Upper bound for any single price or cost
pub const MAX_MONEY: i64 = 10_000_000;

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("date pattern"))
}

fn money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d{1,2})?$").expect("money pattern"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
            .expect("email pattern")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9 ]+$").expect("phone pattern"))
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\p{L}\p{M}\p{N} .,'\-]+$").expect("name pattern"))
}

/// Parse a `DD/MM/YYYY` date. Rejects other layouts and impossible dates
/// such as 31/02/2024.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if !date_re().is_match(input) {
        return None;
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// True iff `date` is strictly before `today`
pub fn date_in_the_past(date: NaiveDate, today: NaiveDate) -> bool {
    date < today
}

/// Why a money amount was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyError {
    Empty,
    Format,
    NotPositive,
    TooLarge,
}

/// Parse a price or cost. A leading `$` and thousands separators are
/// tolerated; at most two decimal places.
pub fn parse_money(input: &str) -> Result<Decimal, MoneyError> {
    let cleaned: String = input
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() {
        return Err(MoneyError::Empty);
    }
    if !money_re().is_match(&cleaned) {
        return Err(MoneyError::Format);
    }
    let value = Decimal::from_str(&cleaned).map_err(|_| MoneyError::Format)?;
    if value <= Decimal::ZERO {
        return Err(MoneyError::NotPositive);
    }
    if value > Decimal::from(MAX_MONEY) {
        return Err(MoneyError::TooLarge);
    }
    Ok(value.round_dp(2))
}

/// Record the message matching a money error under `field`
pub fn money_error(errors: &mut ValidationErrors, field: Field, label: &str, err: MoneyError) {
    let message = match err {
        MoneyError::Empty => format!("{} cannot be empty", label),
        MoneyError::Format => format!(
            "{} must be a number with at most two decimal places, e.g. 1234.56",
            label
        ),
        MoneyError::NotPositive => format!("{} must be greater than zero", label),
        MoneyError::TooLarge => format!("{} must be less than $10,000,000", label),
    };
    errors.add(field, message);
}

pub fn is_valid_email(input: &str) -> bool {
    let input = input.trim();
    input.chars().count() <= 320 && email_re().is_match(input)
}

pub fn is_valid_phone(input: &str) -> bool {
    let input = input.trim();
    if !phone_re().is_match(input) {
        return false;
    }
    let digits = input.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits)
}

/// Letters (any script), digits, spaces and `.,'-`, with at least one letter
pub fn is_valid_name(input: &str) -> bool {
    name_re().is_match(input) && input.chars().any(char::is_alphabetic)
}

pub fn char_len(input: &str) -> usize {
    input.chars().count()
}

/// NFD-decompose and drop combining marks: "Māori café" -> "Maori cafe"
pub fn strip_diacritics(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lowercase, diacritic-free form used for tag storage and searching
pub fn fold(input: &str) -> String {
    strip_diacritics(input).to_lowercase()
}

/// Check a required, length-limited text field. Returns the trimmed value
/// when it passes.
pub fn required_text(
    errors: &mut ValidationErrors,
    field: Field,
    input: &str,
    label: &str,
    max: usize,
) -> Option<String> {
    let value = input.trim();
    if value.is_empty() {
        errors.add(field, format!("{} cannot be empty", label));
        return None;
    }
    if char_len(value) > max {
        errors.add(field, format!("{} must be {} characters or less", label, max));
        return None;
    }
    Some(value.to_string())
}

/// Empty input becomes `None`
pub fn optional(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_accepts_only_dd_mm_yyyy() {
        assert_eq!(parse_date("05/03/2024"), Some(d(2024, 3, 5)));
        assert_eq!(parse_date(" 29/02/2024 "), Some(d(2024, 2, 29)));
        assert_eq!(parse_date("5/3/2024"), None);
        assert_eq!(parse_date("2024-03-05"), None);
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("29/02/2023"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_format_date_matches_parse() {
        assert_eq!(format_date(d(2024, 12, 1)), "01/12/2024");
    }

    #[test]
    fn test_dates_before_today_are_in_the_past() {
        let today = d(2024, 6, 15);
        for text in ["01/01/1999", "14/06/2024", "31/12/2023"] {
            let date = parse_date(text).unwrap();
            assert!(date_in_the_past(date, today), "{} should be past", text);
        }
        assert!(!date_in_the_past(today, today));
        assert!(!date_in_the_past(d(2024, 6, 16), today));
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("120"), Ok(Decimal::new(120, 0)));
        assert_eq!(parse_money("$1,250.5"), Ok(Decimal::new(12505, 1)));
        assert_eq!(parse_money("0.99"), Ok(Decimal::new(99, 2)));
        assert_eq!(parse_money(""), Err(MoneyError::Empty));
        assert_eq!(parse_money("12.345"), Err(MoneyError::Format));
        assert_eq!(parse_money("-5"), Err(MoneyError::Format));
        assert_eq!(parse_money("abc"), Err(MoneyError::Format));
        assert_eq!(parse_money("0.00"), Err(MoneyError::NotPositive));
        assert_eq!(parse_money("10000000.01"), Err(MoneyError::TooLarge));
    }

    #[test]
    fn test_email_and_phone() {
        assert!(is_valid_email("jane.doe+reno@example.co.nz"));
        assert!(!is_valid_email("jane@"));
        assert!(!is_valid_email("jane@example"));
        assert!(is_valid_phone("+64 21 123 4567"));
        assert!(is_valid_phone("0211234567"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("021-123-4567"));
    }

    #[test]
    fn test_name_grammar() {
        assert!(is_valid_name("Kitchen reno, stage 2"));
        assert!(is_valid_name("Te Whare Māori"));
        assert!(is_valid_name("O'Brien-Smith"));
        assert!(!is_valid_name("1234"));
        assert!(!is_valid_name("Bathroom!"));
        assert!(!is_valid_name("<script>"));
    }

    #[test]
    fn test_fold_strips_diacritics_and_case() {
        assert_eq!(fold("Māori Café"), "maori cafe");
        assert_eq!(strip_diacritics("naïve"), "naive");
    }

    #[test]
    fn test_required_text() {
        let mut errors = ValidationErrors::new();
        assert_eq!(
            required_text(&mut errors, Field::Name, "  Deck  ", "Name", 10),
            Some("Deck".to_string())
        );
        assert!(required_text(&mut errors, Field::Name, "   ", "Name", 10).is_none());
        assert!(required_text(&mut errors, Field::Description, "abcdefghijk", "Description", 10).is_none());
        assert_eq!(errors.first(Field::Name), Some("Name cannot be empty"));
        assert_eq!(
            errors.first(Field::Description),
            Some("Description must be 10 characters or less")
        );
    }
}
