//! User account rules

use crate::password::check_password_strength;
use safewatch_common::types::{is_valid_email, normalize_phone};
use safewatch_common::{Error, Result};
use safewatch_storage::models::{CreateUser, UpdateUser, UserStatus};
use serde::Deserialize;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;

/// Role given to new users when none is requested
pub const DEFAULT_ROLE: &str = "viewer";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUserInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    pub role: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
    pub password: Option<String>,
}

/// 3 to 50 characters of letters, digits, `_`, `.` or `-`
pub fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(Error::validation(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(Error::validation(
            "Username may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<String> {
    let email = email.trim();
    if !is_valid_email(email) {
        return Err(Error::validation("A valid email address is required"));
    }
    Ok(email.to_lowercase())
}

fn check_phone(phone: Option<String>) -> Result<Option<String>> {
    match phone.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(p) => normalize_phone(p)
            .map(Some)
            .ok_or_else(|| Error::validation(format!("Invalid phone number: {}", p))),
    }
}

/// Validate a new account. Returns the row to insert and the plain password.
///
/// Role existence is checked against the roles table by the caller.
pub fn validate_new_user(input: NewUserInput) -> Result<(CreateUser, String)> {
    let username = input.username.trim().to_string();
    validate_username(&username)?;
    let email = check_email(&input.email)?;
    check_password_strength(&input.password)?;

    let full_name = input.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(Error::validation("Full name is required"));
    }

    let role = input
        .role
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_ROLE.to_string());

    Ok((
        CreateUser {
            username,
            email,
            full_name,
            role,
            phone: check_phone(input.phone)?,
        },
        input.password,
    ))
}

/// Validate allow-listed changes. A new password, if any, is returned separately.
pub fn validate_user_changes(changes: UserChanges) -> Result<(UpdateUser, Option<String>)> {
    let email = changes.email.as_deref().map(check_email).transpose()?;

    let full_name = match changes.full_name.as_deref().map(str::trim) {
        Some("") => return Err(Error::validation("Full name cannot be empty")),
        other => other.map(str::to_string),
    };

    let status = changes
        .status
        .as_deref()
        .map(|s| s.parse::<UserStatus>().map_err(Error::validation))
        .transpose()?;

    if let Some(password) = &changes.password {
        check_password_strength(password)?;
    }

    Ok((
        UpdateUser {
            email,
            full_name,
            role: changes.role.map(|r| r.trim().to_string()),
            phone: check_phone(changes.phone)?,
            status,
        },
        changes.password,
    ))
}
