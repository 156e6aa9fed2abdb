//! Input validation for account forms
//!
//! These checks run before login and registration requests leave the
//! client. The server re-validates everything.

use crate::error::{CoreError, CoreResult};
use regex::Regex;
use std::sync::LazyLock;

/// Minimum password length accepted by the backend
pub const PASSWORD_MIN_LENGTH: usize = 6;

/// Minimum length of a user's full name
pub const NAME_MIN_LENGTH: usize = 2;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Validate that a string is not blank
pub fn validate_not_empty(value: &str, field: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(field, "cannot be empty"));
    }
    Ok(())
}

/// Validate email format
pub fn validate_email(email: &str) -> CoreResult<()> {
    validate_not_empty(email, "email")?;
    if !EMAIL_REGEX.is_match(email.trim()) {
        return Err(CoreError::validation("email", "invalid email format"));
    }
    Ok(())
}

/// Validate password length
pub fn validate_password(password: &str) -> CoreResult<()> {
    validate_not_empty(password, "password")?;
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(CoreError::validation(
            "password",
            format!("must be at least {PASSWORD_MIN_LENGTH} characters"),
        ));
    }
    Ok(())
}

/// Validate a full name
pub fn validate_full_name(name: &str) -> CoreResult<()> {
    validate_not_empty(name, "full_name")?;
    if name.trim().chars().count() < NAME_MIN_LENGTH {
        return Err(CoreError::validation(
            "full_name",
            format!("must be at least {NAME_MIN_LENGTH} characters"),
        ));
    }
    Ok(())
}

/// Validate login form input
pub fn validate_login(email: &str, password: &str) -> CoreResult<()> {
    validate_email(email)?;
    validate_not_empty(password, "password")
}

/// Validate registration form input
///
/// `confirm_password` is checked only when supplied.
pub fn validate_registration(
    full_name: &str,
    email: &str,
    password: &str,
    confirm_password: Option<&str>,
) -> CoreResult<()> {
    validate_full_name(full_name)?;
    validate_email(email)?;
    validate_password(password)?;

    if let Some(confirm) = confirm_password
        && confirm != password
    {
        return Err(CoreError::validation(
            "confirm_password",
            "passwords do not match",
        ));
    }
    Ok(())
}
