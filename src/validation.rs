// Input validation for student registration
// Rejects bad form input before anything touches disk or the database

use thiserror::Error;

/// Number of digits a student supplies; the checksum digit is appended
pub const PAYLOAD_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("barcode must be exactly {expected} digits, got {actual}")]
    WrongDigitCount { expected: usize, actual: usize },

    #[error("barcode must contain only digits, found {character:?} at position {position}")]
    NonDigit { position: usize, character: char },
}

impl ValidationError {
    /// Name of the input the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingField { field } => field,
            ValidationError::WrongDigitCount { .. } | ValidationError::NonDigit { .. } => "code",
        }
    }
}

/// Registration form input that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationInput {
    pub name: String,
    pub matric_number: String,
    pub payload: [u8; PAYLOAD_LEN],
}

/// Check a registration form. Fields are checked in form order so the
/// first failure reported is the first one the user would see.
pub fn validate_registration(
    name: &str,
    matric_number: &str,
    code: &str,
) -> Result<RegistrationInput, ValidationError> {
    require("name", name)?;
    require("matric_number", matric_number)?;
    require("code", code)?;

    let payload = parse_payload(code)?;

    Ok(RegistrationInput {
        name: name.to_string(),
        matric_number: matric_number.to_string(),
        payload,
    })
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(())
}

/// Parse a 12-character ASCII digit string into its digit values
pub fn parse_payload(code: &str) -> Result<[u8; PAYLOAD_LEN], ValidationError> {
    let actual = code.chars().count();
    if actual != PAYLOAD_LEN {
        return Err(ValidationError::WrongDigitCount {
            expected: PAYLOAD_LEN,
            actual,
        });
    }

    let mut digits = [0u8; PAYLOAD_LEN];
    for (position, character) in code.chars().enumerate() {
        if !character.is_ascii_digit() {
            return Err(ValidationError::NonDigit { position, character });
        }
        digits[position] = character as u8 - b'0';
    }

    Ok(digits)
}
