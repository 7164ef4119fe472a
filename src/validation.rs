//! Field-level validation for the registration form.

use std::sync::LazyLock;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::error::FieldError;
use crate::onboarding::{Field, FormValues};

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{M}]+(?:[ '\-][\p{L}\p{M}]+)*$").expect("name pattern")
});

static NATIONAL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{1,3}[.\-/ ]?[0-9]{3}[.\-/ ]?[0-9]{3}$").expect("national id pattern")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w\-.]+@([\w-]+\.)+[\w-]{2,4}$").expect("email pattern")
});

/// Longest national ID accepted, in digits.
pub const MAX_NATIONAL_ID_DIGITS: usize = 9;

/// A form that passed every field check.
#[derive(Debug)]
pub struct ValidForm {
    pub given_name: String,
    pub surname: String,
    pub national_id: u64,
    pub email: String,
    pub password: SecretString,
}

/// Remove the dots, dashes, slashes and spaces people type into ID numbers.
pub fn strip_id_formatting(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '.' | '-' | '/' | ' '))
        .collect()
}

/// Parse a possibly formatted national ID into a positive integer.
pub fn parse_national_id(raw: &str) -> Result<u64, String> {
    let digits = strip_id_formatting(raw.trim());
    if digits.is_empty() {
        return Err("National ID is required".to_string());
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err("National ID may only contain digits".to_string());
    }
    if digits.len() > MAX_NATIONAL_ID_DIGITS {
        return Err(format!(
            "National ID may have at most {MAX_NATIONAL_ID_DIGITS} digits"
        ));
    }
    match digits.parse::<u64>() {
        Ok(0) => Err("National ID must be positive".to_string()),
        Ok(id) => Ok(id),
        Err(e) => Err(format!("Invalid national ID: {e}")),
    }
}

pub fn is_valid_name(value: &str) -> bool {
    NAME.is_match(value.trim())
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value.trim())
}

pub fn is_valid_national_id(value: &str) -> bool {
    NATIONAL_ID.is_match(value.trim())
}

/// Check every field, collecting all failures rather than stopping at the
/// first one.
pub fn validate_form(form: FormValues) -> Result<ValidForm, Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut fail = |field: Field, message: &str| {
        errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    };

    if !is_valid_name(&form.given_name) {
        fail(Field::GivenName, "Given name must contain letters only");
    }
    if !is_valid_name(&form.surname) {
        fail(Field::Surname, "Surname must contain letters only");
    }

    let national_id = if is_valid_national_id(&form.national_id) {
        parse_national_id(&form.national_id).ok()
    } else {
        None
    };
    if national_id.is_none() {
        fail(Field::NationalId, "National ID must have 7 to 9 digits");
    }

    if !is_valid_email(&form.email) {
        fail(Field::Email, "Email address is not valid");
    }

    let password = form.password.expose_secret();
    if password.is_empty() {
        fail(Field::Password, "Password is required");
    }
    let confirmation = form.password_confirmation.expose_secret();
    if confirmation.is_empty() {
        fail(Field::PasswordConfirmation, "Password confirmation is required");
    } else if confirmation != password {
        fail(Field::PasswordConfirmation, "Passwords do not match");
    }

    match national_id {
        Some(national_id) if errors.is_empty() => Ok(ValidForm {
            given_name: form.given_name.trim().to_string(),
            surname: form.surname.trim().to_string(),
            national_id,
            email: form.email.trim().to_string(),
            password: form.password,
        }),
        _ => Err(errors),
    }
}
