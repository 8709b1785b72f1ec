//! Input validation for credentials.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use validator::ValidateEmail;

/// Validation error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Email address is malformed.
    #[error("Invalid email address")]
    InvalidEmail,

    /// Password is shorter than allowed.
    #[error("Password too short (min {min} chars)")]
    PasswordTooShort {
        /// Minimum length.
        min: usize,
    },

    /// Password is longer than allowed.
    #[error("Password too long (max {max} chars)")]
    PasswordTooLong {
        /// Maximum length.
        max: usize,
    },

    /// Disallowed characters in input.
    #[error("Disallowed characters in input")]
    DisallowedChars,
}

/// Credential length limits.
pub mod limits {
    /// Minimum password length in characters.
    pub const MIN_PASSWORD_LENGTH: usize = 8;

    /// Maximum password length in characters. Bounds hashing work per request.
    pub const MAX_PASSWORD_LENGTH: usize = 128;

    /// Maximum email length in bytes.
    pub const MAX_EMAIL_LENGTH: usize = 254;
}

/// Normalize and validate an email address.
///
/// Trims whitespace, applies NFKC and lowercases, so uniqueness checks
/// compare canonical forms.
///
/// # Errors
///
/// Returns `ValidationError::InvalidEmail` if the result isn't a valid address.
pub fn normalize_email(input: &str) -> Result<String, ValidationError> {
    let normalized: String = input.trim().nfkc().collect::<String>().to_lowercase();

    if normalized.len() > limits::MAX_EMAIL_LENGTH || !normalized.validate_email() {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(normalized)
}

/// Validate a password before hashing.
///
/// # Errors
///
/// Returns an error if the password length is out of bounds or it contains
/// control characters.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len < limits::MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort {
            min: limits::MIN_PASSWORD_LENGTH,
        });
    }
    if len > limits::MAX_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooLong {
            max: limits::MAX_PASSWORD_LENGTH,
        });
    }
    if password.chars().any(char::is_control) {
        return Err(ValidationError::DisallowedChars);
    }
    Ok(())
}
