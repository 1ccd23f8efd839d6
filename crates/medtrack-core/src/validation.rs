//! # Validation Module
//!
//! Input validation rules for MedTrack.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API (serde deserialization)                                  │
//! │  ├── Shape and type of the JSON body                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Field rules (lengths, ranges, formats)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE / CHECK (quantity >= 0)                         │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use medtrack_core::validation::{validate_email, validate_quantity};
//!
//! assert!(validate_email("owner@pharmacy.test").is_ok());
//! assert!(validate_quantity(5).is_ok());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{MAX_EXPENSE_CENTS, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS, MAX_STOCK_LEVEL};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field and returns it trimmed.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `max` characters
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates a display name (person, pharmacy, medicine).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    validate_text(field, name, 200)
}

/// Validates and normalizes an email address (trimmed, lower-cased).
///
/// ## Rules
/// - Exactly one `@` with a non-empty local part
/// - Domain contains a dot that is neither first nor last
/// - No whitespace, at most 254 characters
///
/// ```rust
/// use medtrack_core::validation::validate_email;
///
/// assert_eq!(validate_email(" Owner@Pharmacy.TEST ").unwrap(), "owner@pharmacy.test");
/// assert!(validate_email("owner@pharmacy").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim().to_lowercase();
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }
    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 254,
        });
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain spaces"));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("must contain '@'"))?;

    if local.is_empty() || domain.contains('@') {
        return Err(invalid("must be of the form name@domain"));
    }
    match domain.find('.') {
        Some(pos) if pos > 0 && !domain.ends_with('.') => Ok(email.clone()),
        _ => Err(invalid("domain must contain a dot")),
    }
}

/// Validates a password against the pharmacy's minimum length.
pub fn validate_password(password: &str, min_length: i64) -> ValidationResult<()> {
    let min = min_length.max(1) as usize;

    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }
    if password.chars().count() < min {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min,
        });
    }
    if password.len() > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }

    Ok(())
}

/// Validates a pharmacy license number and returns it upper-cased.
///
/// ## Rules
/// - 3 to 50 characters
/// - Letters, digits, `-` and `/` only
pub fn validate_license_number(license: &str) -> ValidationResult<String> {
    let license = license.trim().to_uppercase();

    if license.is_empty() {
        return Err(ValidationError::Required {
            field: "licenseNumber".to_string(),
        });
    }
    if license.len() < 3 {
        return Err(ValidationError::TooShort {
            field: "licenseNumber".to_string(),
            min: 3,
        });
    }
    if license.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "licenseNumber".to_string(),
            max: 50,
        });
    }
    if !license
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/')
    {
        return Err(ValidationError::InvalidFormat {
            field: "licenseNumber".to_string(),
            reason: "must contain only letters, numbers, '-' and '/'".to_string(),
        });
    }

    Ok(license)
}

/// Validates a search query and returns it trimmed. Empty is allowed.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates a prescription's medication list. Returns trimmed, non-empty lines.
pub fn validate_medications(medications: &[String]) -> ValidationResult<Vec<String>> {
    let cleaned: Vec<String> = medications
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();

    if cleaned.is_empty() {
        return Err(ValidationError::Required {
            field: "medications".to_string(),
        });
    }
    if cleaned.len() > 50 {
        return Err(ValidationError::OutOfRange {
            field: "medications".to_string(),
            min: 1,
            max: 50,
        });
    }
    if cleaned.iter().any(|m| m.chars().count() > 500) {
        return Err(ValidationError::TooLong {
            field: "medications".to_string(),
            max: 500,
        });
    }

    Ok(cleaned)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock level on an inventory record (zero allowed, at most
/// MAX_STOCK_LEVEL).
pub fn validate_stock_level(qty: i64) -> ValidationResult<()> {
    validate_range("quantity", qty, 0, MAX_STOCK_LEVEL)
}

/// Validates a price in cents. Zero is allowed (free samples).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    validate_range("price", cents, 0, MAX_PRICE_CENTS)
}

/// Validates an expense amount in cents.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_EXPENSE_CENTS
pub fn validate_expense_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    if cents > MAX_EXPENSE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 1,
            max: MAX_EXPENSE_CENTS,
        });
    }
    Ok(())
}

/// Validates a patient age in years.
pub fn validate_age(age: i64) -> ValidationResult<()> {
    if !(0..=150).contains(&age) {
        return Err(ValidationError::OutOfRange {
            field: "age".to_string(),
            min: 0,
            max: 150,
        });
    }
    Ok(())
}

/// Validates a bounded integer setting.
pub fn validate_range(field: &str, value: i64, min: i64, max: i64) -> ValidationResult<()> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Identifier & Date Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ```rust
/// use medtrack_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(field: &str, value: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected YYYY-MM-DD".to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("a@b.co").unwrap(), "a@b.co");
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at.example.com").is_err());
        assert!(validate_email("two@@example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@.com").is_err());
        assert!(validate_email("a@example.").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn test_validate_password_uses_min_length() {
        assert!(validate_password("12345678", 8).is_ok());
        assert!(matches!(
            validate_password("1234567", 8),
            Err(ValidationError::TooShort { min: 8, .. })
        ));
        assert!(validate_password("123456", 6).is_ok());
        assert!(validate_password("", 6).is_err());
    }

    #[test]
    fn test_validate_license_number() {
        assert_eq!(validate_license_number(" ph-2024/17 ").unwrap(), "PH-2024/17");
        assert!(validate_license_number("AB").is_err());
        assert!(validate_license_number("PH 001").is_err());
        assert!(validate_license_number(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_text() {
        assert_eq!(validate_name("name", "  Aspirin ").unwrap(), "Aspirin");
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_medications() {
        let meds = vec!["  Amoxicillin 500mg ".to_string(), "".to_string()];
        assert_eq!(validate_medications(&meds).unwrap(), vec!["Amoxicillin 500mg"]);
        assert!(validate_medications(&[]).is_err());
        assert!(validate_medications(&["  ".to_string()]).is_err());
    }

    #[test]
    fn test_numeric_rules() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(1000).is_err());

        assert!(validate_stock_level(0).is_ok());
        assert!(validate_stock_level(-1).is_err());

        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());

        assert!(validate_expense_amount(1).is_ok());
        assert!(validate_expense_amount(0).is_err());

        assert!(validate_age(0).is_ok());
        assert!(validate_age(151).is_err());

        assert!(validate_range("retentionDays", 7, 1, 365).is_ok());
        assert!(validate_range("retentionDays", 0, 1, 365).is_err());
    }

    #[test]
    fn test_amounts_have_upper_limits() {
        assert!(validate_stock_level(MAX_STOCK_LEVEL).is_ok());
        assert!(matches!(
            validate_stock_level(1_000_000_000_000),
            Err(ValidationError::OutOfRange { min: 0, max: MAX_STOCK_LEVEL, .. })
        ));

        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(matches!(
            validate_price_cents(i64::MAX / 2),
            Err(ValidationError::OutOfRange { max: MAX_PRICE_CENTS, .. })
        ));

        assert!(validate_expense_amount(MAX_EXPENSE_CENTS).is_ok());
        assert!(matches!(
            validate_expense_amount(MAX_EXPENSE_CENTS + 1),
            Err(ValidationError::OutOfRange { field, .. }) if field == "amount"
        ));

        // A full record at both limits still prices without overflow.
        let value = crate::Money::from_cents(MAX_PRICE_CENTS).checked_multiply_quantity(MAX_STOCK_LEVEL);
        assert_eq!(value.map(|m| m.cents()), Some(100_000_000_000_000));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("from", "2026-02-28").unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );
        assert!(parse_date("from", "2026-02-30").is_err());
        assert!(parse_date("from", "28/02/2026").is_err());
    }
}
