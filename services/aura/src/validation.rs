//! Input validation utilities

use common::store::sanitize_file_name;

pub const CREDENTIALS_REQUIRED: &str = "Username and password are required.";

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err(CREDENTIALS_REQUIRED.to_string());
    }

    if username.chars().count() > 64 {
        return Err("Username must be at most 64 characters long".to_string());
    }

    if username.chars().any(char::is_control) {
        return Err("Username cannot contain control characters".to_string());
    }

    // History files are named after the sanitized username
    if sanitize_file_name(username).is_empty() {
        return Err("Username must contain at least one letter or digit".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err(CREDENTIALS_REQUIRED.to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

/// Validate a login or registration form
pub fn validate_credentials(username: &str, password: &str) -> Result<(), String> {
    if username.is_empty() || password.is_empty() {
        return Err(CREDENTIALS_REQUIRED.to_string());
    }
    validate_username(username)?;
    validate_password(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            validate_credentials("", "pw").unwrap_err(),
            CREDENTIALS_REQUIRED
        );
        assert_eq!(
            validate_credentials("alice", "").unwrap_err(),
            CREDENTIALS_REQUIRED
        );
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("Jane Doe").is_ok());
        assert!(validate_username(&"a".repeat(65)).is_err());
        assert!(validate_username("bad\nname").is_err());
        assert!(validate_username("../..").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("x").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }
}
