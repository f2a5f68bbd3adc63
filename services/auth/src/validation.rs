//! Input validation for registration and password reset

use std::sync::OnceLock;

use regex::Regex;

use crate::models::RegisterRequest;

pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required".to_string());
    }
    if name.chars().count() > 100 {
        return Err("Name must be at most 100 characters long".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// 8 to 128 characters with upper and lower case letters, a digit and a
/// symbol
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }
    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    let rules: [(fn(char) -> bool, &str); 4] = [
        (|c| c.is_ascii_uppercase(), "an uppercase letter"),
        (|c| c.is_ascii_lowercase(), "a lowercase letter"),
        (|c| c.is_ascii_digit(), "a digit"),
        (|c| !c.is_alphanumeric(), "a special character"),
    ];
    for (rule, what) in rules {
        if !password.chars().any(rule) {
            return Err(format!("Password must contain at least {}", what));
        }
    }
    Ok(())
}

pub fn validate_registration(request: &RegisterRequest) -> Result<(), String> {
    validate_name(&request.name)?;
    validate_email(request.email.trim())?;
    validate_password(&request.password)
}
