//! Synchronous input validation.
//!
//! User input errors are rejected here, before any state mutation or
//! external call, with a specific reason the UI can surface verbatim.

use crate::error::{Error, Result};
use crate::defaults;

/// Maximum accepted display name length.
pub const MAX_NAME_LENGTH: usize = 120;

/// Validate and normalize an email address.
///
/// Comparison and storage use the normalized (trimmed, lower-cased) form so
/// that `Tech@Lab.example` and `tech@lab.example` are the same account.
pub fn normalize_email(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("email must not be empty".to_string()));
    }
    let mut parts = trimmed.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() || parts.next().is_some() {
        return Err(Error::InvalidInput(format!(
            "not a valid email address: {}",
            trimmed
        )));
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(Error::InvalidInput(format!(
            "email domain is not valid: {}",
            domain
        )));
    }
    Ok(trimmed.to_lowercase())
}

/// Validate a candidate password.
pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::InvalidInput("password must not be empty".to_string()));
    }
    if password.len() < defaults::MIN_PASSWORD_LENGTH {
        return Err(Error::InvalidInput(format!(
            "password must be at least {} characters",
            defaults::MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Validate a display name.
pub fn validate_display_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("name must not be empty".to_string()));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(Error::InvalidInput(format!(
            "name exceeds {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_lowercases_and_trims() {
        assert_eq!(
            normalize_email("  Tech@Lab.Example ").unwrap(),
            "tech@lab.example"
        );
    }

    #[test]
    fn test_normalize_email_rejects_empty() {
        assert!(normalize_email("").is_err());
        assert!(normalize_email("   ").is_err());
    }

    #[test]
    fn test_normalize_email_rejects_malformed() {
        for bad in ["no-at-sign", "@lab.example", "tech@", "a@b@c.d", "tech@nodot"] {
            assert!(normalize_email(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_normalize_email_rejects_dangling_dots() {
        assert!(normalize_email("tech@.example").is_err());
        assert!(normalize_email("tech@example.").is_err());
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("").is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Asha N.").is_ok());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }
}
