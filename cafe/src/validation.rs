//! Input validation shared by registration, profile edits and admin forms.
//!
//! Plain character checks; no regex dependency.

use crate::config::{MAX_NAME_LENGTH, MIN_PASSWORD_LENGTH};
use crate::error::{AppError, Result};

/// Trimmed, lowercased email used for comparisons
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

/// Ethiopian mobile numbers: +2519XXXXXXXX, +2517XXXXXXXX, 09XXXXXXXX, 07XXXXXXXX.
/// Spaces and dashes are ignored.
pub fn is_valid_ethiopian_phone(phone: &str) -> bool {
    let digits: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    let national = if let Some(rest) = digits.strip_prefix("+251") {
        rest.to_string()
    } else if let Some(rest) = digits.strip_prefix("251") {
        rest.to_string()
    } else if let Some(rest) = digits.strip_prefix('0') {
        rest.to_string()
    } else {
        return false;
    };

    national.len() == 9
        && national.chars().all(|c| c.is_ascii_digit())
        && (national.starts_with('9') || national.starts_with('7'))
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AppError::validation(
            "Password must contain an uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AppError::validation(
            "Password must contain a lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::validation("Password must contain a number"));
    }
    Ok(())
}

/// Reject empty (after trimming) required fields
pub fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<()> {
    require("Name", name)?;
    if name.trim().chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::validation(format!(
            "Name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    require("Email", email)?;
    if !is_valid_email(email) {
        return Err(AppError::validation("Please enter a valid email address"));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<()> {
    require("Phone", phone)?;
    if !is_valid_ethiopian_phone(phone) {
        return Err(AppError::validation(
            "Please enter a valid Ethiopian phone number (e.g. 0911234567)",
        ));
    }
    Ok(())
}

/// Case-insensitive substring match used by every `search`
pub fn matches_query(query: &str, fields: &[&str]) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(&query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emails() {
        assert!(is_valid_email("abebe@example.com"));
        assert!(is_valid_email("  Abebe.K@mail.example.et "));
        assert!(!is_valid_email("abebe"));
        assert!(!is_valid_email("abebe@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@@example.com"));
        assert!(!is_valid_email("a@example..com"));
    }

    #[test]
    fn test_ethiopian_phones() {
        assert!(is_valid_ethiopian_phone("0911234567"));
        assert!(is_valid_ethiopian_phone("0711234567"));
        assert!(is_valid_ethiopian_phone("+251911234567"));
        assert!(is_valid_ethiopian_phone("+251 91 123 4567"));
        assert!(is_valid_ethiopian_phone("251711234567"));

        assert!(!is_valid_ethiopian_phone("0811234567"));
        assert!(!is_valid_ethiopian_phone("091123456"));
        assert!(!is_valid_ethiopian_phone("+2519112345678"));
        assert!(!is_valid_ethiopian_phone("+15551234567"));
        assert!(!is_valid_ethiopian_phone("09112345ab"));
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("Secret123").is_ok());
        assert!(validate_password("Sec123").is_err());
        assert!(validate_password("secret123").is_err());
        assert!(validate_password("SECRET123").is_err());
        assert!(validate_password("SecretPass").is_err());
    }

    #[test]
    fn test_require() {
        assert!(require("Name", "Abebe").is_ok());
        assert!(require("Name", "   ").is_err());
    }

    #[test]
    fn test_matches_query() {
        assert!(matches_query("BUNA", &["Buna Coffee", "hot"]));
        assert!(matches_query("", &["anything"]));
        assert!(!matches_query("tea", &["Buna", "coffee"]));
    }
}
