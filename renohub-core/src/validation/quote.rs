//! Quote form validation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{
    char_len, is_valid_email, is_valid_phone, money_error, optional, parse_money, required_text,
};
use super::{Field, ValidationErrors};

pub const DESCRIPTION_MAX: usize = 512;
pub const MAX_ESTIMATED_DAYS: u32 = 3650;

pub const ESTIMATED_TIME_EMPTY: &str = "Estimated work time cannot be empty";
pub const ESTIMATED_TIME_INVALID: &str =
    "Estimated work time must be a whole number of days between 1 and 3650";
pub const CONTACT_REQUIRED: &str = "Either an email or a phone number must be provided";
pub const EMAIL_INVALID: &str = "Email address must be in the form 'jane@doe.nz'";
pub const PHONE_INVALID: &str =
    "Phone number must contain 7 to 15 digits and may start with '+'";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteForm {
    pub price: String,
    pub estimated_days: String,
    pub description: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuote {
    pub price: Decimal,
    pub estimated_days: u32,
    pub description: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub fn validate_quote(form: &QuoteForm) -> Result<ParsedQuote, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let price = match parse_money(&form.price) {
        Ok(price) => Some(price),
        Err(e) => {
            money_error(&mut errors, Field::Price, "Price", e);
            None
        }
    };

    let estimated_days = match optional(&form.estimated_days) {
        None => {
            errors.add(Field::EstimatedTime, ESTIMATED_TIME_EMPTY);
            None
        }
        Some(raw) => match raw.parse::<u32>() {
            Ok(days) if (1..=MAX_ESTIMATED_DAYS).contains(&days) => Some(days),
            _ => {
                errors.add(Field::EstimatedTime, ESTIMATED_TIME_INVALID);
                None
            }
        },
    };

    let description = required_text(
        &mut errors,
        Field::Description,
        &form.description,
        "Quote description",
        DESCRIPTION_MAX,
    );

    let email = optional(&form.email).map(str::to_string);
    let phone = optional(&form.phone).map(str::to_string);
    match (&email, &phone) {
        (None, None) => {
            errors.add(Field::Email, CONTACT_REQUIRED);
        }
        _ => {
            if let Some(e) = &email {
                if !is_valid_email(e) {
                    errors.add(Field::Email, EMAIL_INVALID);
                }
            }
            if let Some(p) = &phone {
                if !is_valid_phone(p) || char_len(p) > 20 {
                    errors.add(Field::Phone, PHONE_INVALID);
                }
            }
        }
    }

    match (price, estimated_days, description) {
        (Some(price), Some(estimated_days), Some(description)) if errors.is_empty() => {
            Ok(ParsedQuote {
                price,
                estimated_days,
                description,
                email: email.map(|e| e.to_lowercase()),
                phone,
            })
        }
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> QuoteForm {
        QuoteForm {
            price: "4500".to_string(),
            estimated_days: "6".to_string(),
            description: "Full bathroom retile".to_string(),
            email: "Tiler@Example.com".to_string(),
            phone: "".to_string(),
        }
    }

    #[test]
    fn test_valid_quote() {
        let parsed = validate_quote(&form()).unwrap();
        assert_eq!(parsed.price, Decimal::new(4500, 0));
        assert_eq!(parsed.estimated_days, 6);
        assert_eq!(parsed.email.as_deref(), Some("tiler@example.com"));
        assert!(parsed.phone.is_none());
    }

    #[test]
    fn test_contact_required() {
        let mut f = form();
        f.email.clear();
        let errors = validate_quote(&f).unwrap_err();
        assert!(errors.contains(Field::Email, CONTACT_REQUIRED));

        f.phone = "021 555 0199".to_string();
        assert!(validate_quote(&f).is_ok());
    }

    #[test]
    fn test_estimated_time_bounds() {
        for bad in ["0", "-2", "1.5", "3651", "soon"] {
            let mut f = form();
            f.estimated_days = bad.to_string();
            let errors = validate_quote(&f).unwrap_err();
            assert!(
                errors.contains(Field::EstimatedTime, ESTIMATED_TIME_INVALID),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_invalid_contacts_reported_separately() {
        let mut f = form();
        f.email = "nope".to_string();
        f.phone = "12".to_string();
        let errors = validate_quote(&f).unwrap_err();
        assert!(errors.contains(Field::Email, EMAIL_INVALID));
        assert!(errors.contains(Field::Phone, PHONE_INVALID));
    }

    #[test]
    fn test_price_must_be_positive() {
        let mut f = form();
        f.price = "0".to_string();
        let errors = validate_quote(&f).unwrap_err();
        assert_eq!(errors.first(Field::Price), Some("Price must be greater than zero"));
    }
}
