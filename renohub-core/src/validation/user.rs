//! Registration, profile and password validation

use serde::{Deserialize, Serialize};

use super::common::{char_len, is_valid_email, is_valid_name, optional, required_text};
use super::{Field, ValidationErrors};

pub const NAME_MAX: usize = 64;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 128;

pub const FIRST_NAME_INVALID: &str =
    "First name must include a letter and only letters, numbers, spaces, dots, commas, hyphens or apostrophes";
pub const LAST_NAME_INVALID: &str =
    "Last name must include a letter and only letters, numbers, spaces, dots, commas, hyphens or apostrophes";
pub const EMAIL_INVALID: &str = "Email address must be in the form 'jane@doe.nz'";
pub const EMAIL_TAKEN: &str = "This email address is already in use";
pub const PASSWORD_WEAK: &str = "Your password must be at least 8 characters long and include at least one uppercase letter, one lowercase letter, one number, and one special character";
pub const PASSWORD_TOO_LONG: &str = "Password must be 128 characters or less";
pub const PASSWORD_PERSONAL: &str = "Password must not contain your name or email";
pub const PASSWORD_MISMATCH: &str = "Passwords do not match";
pub const SUBURB_INVALID: &str =
    "Suburb must only include letters, numbers, spaces, dots, commas, hyphens or apostrophes";
pub const CITY_INVALID: &str =
    "City must only include letters, numbers, spaces, dots, commas, hyphens or apostrophes";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub no_last_name: bool,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRegistration {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PasswordForm {
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileForm {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub no_last_name: bool,
    pub email: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub suburb: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedProfile {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub city: Option<String>,
    pub suburb: Option<String>,
}

fn check_names(
    errors: &mut ValidationErrors,
    first: &str,
    last: &str,
    no_last_name: bool,
) -> (Option<String>, Option<String>) {
    let first_name = required_text(errors, Field::FirstName, first, "First name", NAME_MAX);
    if let Some(f) = &first_name {
        if !is_valid_name(f) {
            errors.add(Field::FirstName, FIRST_NAME_INVALID);
        }
    }

    let last_name = if no_last_name {
        None
    } else {
        let last = required_text(errors, Field::LastName, last, "Last name", NAME_MAX);
        if let Some(l) = &last {
            if !is_valid_name(l) {
                errors.add(Field::LastName, LAST_NAME_INVALID);
            }
        }
        last
    };

    (first_name, last_name)
}

fn check_email(errors: &mut ValidationErrors, email: &str, taken: bool) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        errors.add(Field::Email, "Email cannot be empty");
        return None;
    }
    if !is_valid_email(email) {
        errors.add(Field::Email, EMAIL_INVALID);
        return None;
    }
    if taken {
        errors.add(Field::Email, EMAIL_TAKEN);
        return None;
    }
    Some(email.to_lowercase())
}

/// Password strength rules shared by registration and resets
fn check_password(
    errors: &mut ValidationErrors,
    form: &PasswordForm,
    first_name: &str,
    last_name: Option<&str>,
    email: &str,
) {
    let password = &form.password;
    let strong = char_len(password) >= PASSWORD_MIN
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if !strong {
        errors.add(Field::Password, PASSWORD_WEAK);
    } else if char_len(password) > PASSWORD_MAX {
        errors.add(Field::Password, PASSWORD_TOO_LONG);
    }

    let lowered = password.to_lowercase();
    let local_part = email.split('@').next().unwrap_or("").trim().to_lowercase();
    let personal = [Some(first_name), last_name, Some(local_part.as_str())]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .any(|s| lowered.contains(&s));
    if personal {
        errors.add(Field::Password, PASSWORD_PERSONAL);
    }

    if form.password != form.confirm_password {
        errors.add(Field::ConfirmPassword, PASSWORD_MISMATCH);
    }
}

pub fn validate_registration(
    form: &RegistrationForm,
    email_taken: bool,
) -> Result<ParsedRegistration, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let (first_name, last_name) =
        check_names(&mut errors, &form.first_name, &form.last_name, form.no_last_name);
    let email = check_email(&mut errors, &form.email, email_taken);

    check_password(
        &mut errors,
        &PasswordForm {
            password: form.password.clone(),
            confirm_password: form.confirm_password.clone(),
        },
        form.first_name.trim(),
        optional(&form.last_name).filter(|_| !form.no_last_name),
        &form.email,
    );

    match (first_name, email) {
        (Some(first_name), Some(email)) if errors.is_empty() => Ok(ParsedRegistration {
            first_name,
            last_name,
            email,
            password: form.password.clone(),
        }),
        _ => Err(errors),
    }
}

/// Validate a replacement password for an existing user
pub fn validate_new_password(
    form: &PasswordForm,
    first_name: &str,
    last_name: Option<&str>,
    email: &str,
) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_password(&mut errors, form, first_name, last_name, email);
    errors.into_result(form.password.clone())
}

pub fn validate_profile(
    form: &ProfileForm,
    email_taken: bool,
) -> Result<ParsedProfile, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let (first_name, last_name) =
        check_names(&mut errors, &form.first_name, &form.last_name, form.no_last_name);
    let email = check_email(&mut errors, &form.email, email_taken);

    let city = optional(&form.city).map(str::to_string);
    if let Some(c) = &city {
        if char_len(c) > NAME_MAX || !is_valid_name(c) {
            errors.add(Field::City, CITY_INVALID);
        }
    }
    let suburb = optional(&form.suburb).map(str::to_string);
    if let Some(s) = &suburb {
        if char_len(s) > NAME_MAX || !is_valid_name(s) {
            errors.add(Field::Suburb, SUBURB_INVALID);
        }
    }

    match (first_name, email) {
        (Some(first_name), Some(email)) if errors.is_empty() => Ok(ParsedProfile {
            first_name,
            last_name,
            email,
            city,
            suburb,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> RegistrationForm {
        RegistrationForm {
            first_name: "Hemi".to_string(),
            last_name: "Walker".to_string(),
            no_last_name: false,
            email: "Hemi.W@example.nz".to_string(),
            password: "Tr1cky#Pass".to_string(),
            confirm_password: "Tr1cky#Pass".to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        let parsed = validate_registration(&registration(), false).unwrap();
        assert_eq!(parsed.email, "hemi.w@example.nz");
        assert_eq!(parsed.last_name.as_deref(), Some("Walker"));
    }

    #[test]
    fn test_no_last_name_skips_last_name_rules() {
        let mut form = registration();
        form.last_name = "!!!".to_string();
        form.no_last_name = true;
        let parsed = validate_registration(&form, false).unwrap();
        assert!(parsed.last_name.is_none());
    }

    #[test]
    fn test_email_taken() {
        let errors = validate_registration(&registration(), true).unwrap_err();
        assert!(errors.contains(Field::Email, EMAIL_TAKEN));
    }

    #[test]
    fn test_weak_passwords() {
        for weak in ["short1!", "alllowercase1!", "ALLUPPER1!", "NoDigits!!", "NoSymbol123"] {
            let mut form = registration();
            form.password = weak.to_string();
            form.confirm_password = weak.to_string();
            let errors = validate_registration(&form, false).unwrap_err();
            assert!(errors.contains(Field::Password, PASSWORD_WEAK), "{} accepted", weak);
        }
    }

    #[test]
    fn test_password_must_not_contain_personal_details() {
        let mut form = registration();
        form.password = "Walker#2024".to_string();
        form.confirm_password = form.password.clone();
        let errors = validate_registration(&form, false).unwrap_err();
        assert!(errors.contains(Field::Password, PASSWORD_PERSONAL));
    }

    #[test]
    fn test_short_names_still_count_as_personal_details() {
        let form = RegistrationForm {
            first_name: "Al".to_string(),
            last_name: "Li".to_string(),
            no_last_name: false,
            email: "al@example.com".to_string(),
            password: "Al#Renov8".to_string(),
            confirm_password: "Al#Renov8".to_string(),
        };
        let errors = validate_registration(&form, false).unwrap_err();
        assert!(errors.contains(Field::Password, PASSWORD_PERSONAL));
    }

    #[test]
    fn test_name_message_matches_name_rule() {
        let mut form = registration();
        form.first_name = "Hemi 2nd, Jr.".to_string();
        form.last_name = "1234".to_string();
        let errors = validate_registration(&form, false).unwrap_err();
        assert!(!errors.has(Field::FirstName));
        assert!(errors.contains(Field::LastName, LAST_NAME_INVALID));
        assert!(LAST_NAME_INVALID.contains("numbers"));
    }

    #[test]
    fn test_password_mismatch() {
        let mut form = registration();
        form.confirm_password = "Different#1".to_string();
        let errors = validate_registration(&form, false).unwrap_err();
        assert!(errors.contains(Field::ConfirmPassword, PASSWORD_MISMATCH));
        assert!(!errors.has(Field::Password));
    }

    #[test]
    fn test_new_password() {
        let form = PasswordForm {
            password: "Fresh#Start9".to_string(),
            confirm_password: "Fresh#Start9".to_string(),
        };
        assert!(validate_new_password(&form, "Hemi", Some("Walker"), "hemi@example.nz").is_ok());
    }

    #[test]
    fn test_profile() {
        let form = ProfileForm {
            first_name: "Hemi".to_string(),
            last_name: "".to_string(),
            no_last_name: true,
            email: "hemi@example.nz".to_string(),
            city: "Christchurch".to_string(),
            suburb: "".to_string(),
        };
        let parsed = validate_profile(&form, false).unwrap();
        assert_eq!(parsed.city.as_deref(), Some("Christchurch"));
        assert!(parsed.suburb.is_none());
    }
}
