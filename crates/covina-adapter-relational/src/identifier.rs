//! Table/location name validation, shared across both backends.

use covina_core::Error;

/// Reject anything that isn't a plain SQL identifier: this is the only
/// defense between a caller-supplied location string and a raw `format!`ed
/// table name in every query this adapter builds.
pub fn validate_identifier(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::BadRequest {
            reason: "location cannot be empty".to_string(),
        });
    }
    if name.len() > 63 {
        return Err(Error::BadRequest {
            reason: format!("location '{name}' exceeds 63 characters"),
        });
    }

    let mut chars = name.chars();
    let first = chars.next().expect("checked non-empty above");
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(Error::BadRequest {
            reason: format!("location '{name}' must start with a letter or underscore"),
        });
    }
    if chars.any(|c| !c.is_ascii_alphanumeric() && c != '_') {
        return Err(Error::BadRequest {
            reason: format!("location '{name}' contains a character outside [a-zA-Z0-9_]"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_pass() {
        assert!(validate_identifier("master_documents").is_ok());
        assert!(validate_identifier("_internal").is_ok());
    }

    #[test]
    fn empty_and_injected_identifiers_are_rejected() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("people; DROP TABLE people;--").is_err());
        assert!(validate_identifier("1people").is_err());
    }
}
