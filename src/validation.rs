//! Input validation helpers shared by the request DTOs.

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use validator::ValidationError;

lazy_static::lazy_static! {
    /// Usernames: letters, digits and `@ . + - _`.
    pub static ref USERNAME_REGEX: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
}

/// Wire format of every date field.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).ok()
}

/// `validator` hook for string fields that must hold a date.
pub fn validate_date(input: &str) -> Result<(), ValidationError> {
    match parse_date(input) {
        Some(_) => Ok(()),
        None => {
            let mut error = ValidationError::new("date");
            error.message =
                Some("Date has wrong format. Use one of these formats instead: YYYY-MM-DD.".into());
            Err(error)
        }
    }
}

/// Strips surrounding whitespace before validation, so a blank string fails
/// `length(min = 1)` instead of being stored empty.
pub fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string())
}

/// Username used when a registration omits one: the local part of the email.
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

fn param_u64(error: &ValidationError, name: &str) -> Option<u64> {
    error.params.get(name).and_then(Value::as_u64)
}

/// Renders a `validator` error as the sentence sent back to the client.
pub fn describe_validation_error(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    match error.code.as_ref() {
        "length" => {
            let actual = error
                .params
                .get("value")
                .and_then(Value::as_str)
                .map(|value| value.chars().count() as u64);
            let max = param_u64(error, "max");
            let min = param_u64(error, "min");
            match (actual, min, max) {
                (Some(0), Some(_), _) => "This field may not be blank.".to_string(),
                (Some(len), _, Some(max)) if len > max => {
                    format!("Ensure this field has no more than {} characters.", max)
                }
                (_, Some(min), _) => format!("Ensure this field has at least {} characters.", min),
                _ => "Ensure this field has a valid length.".to_string(),
            }
        }
        "required" => "This field is required.".to_string(),
        "email" => "Enter a valid email address.".to_string(),
        "range" => match error.params.get("min") {
            Some(min) => format!("Ensure this value is greater than or equal to {}.", min),
            None => "Ensure this value is within the allowed range.".to_string(),
        },
        code => format!("Invalid value ({}).", code),
    }
}
