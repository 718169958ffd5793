//! Input checks performed before contacting the auth service.

use crate::{AuthError, AuthResult};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn validate_email(email: &str) -> AuthResult<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "Please enter a valid email address.".to_string(),
        ))
    }
}

pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password should be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn validate_full_name(full_name: &str) -> AuthResult<()> {
    if full_name.trim().is_empty() {
        return Err(AuthError::Validation("Full name is required.".to_string()));
    }
    Ok(())
}

/// Optional E.164-style number: leading `+`, 8 to 15 digits.
pub fn validate_phone(phone: Option<&str>) -> AuthResult<()> {
    let Some(phone) = phone.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(());
    };

    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let valid = (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "Please enter a valid phone number.".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("rider@example.com").is_ok());
        assert!(validate_email("  rider@example.ae ").is_ok());

        for bad in ["", "rider", "@example.com", "rider@", "rider@example", "a b@c.com", "a@b@c.com"] {
            assert!(
                matches!(validate_email(bad), Err(AuthError::Validation(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("12345").is_err());
    }

    #[test]
    fn test_validate_full_name() {
        assert!(validate_full_name("Omar").is_ok());
        assert!(validate_full_name("   ").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone(None).is_ok());
        assert!(validate_phone(Some("")).is_ok());
        assert!(validate_phone(Some("+971501234567")).is_ok());
        assert!(validate_phone(Some("050-123")).is_err());
        assert!(validate_phone(Some("+12")).is_err());
    }
}
