//! # Validation Module
//!
//! Input validation for storefront operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (Rust)                                          │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Service call                                                 │
//! │  └── THIS MODULE: quantities, reasons, codes, addresses                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (balance_paise >= 0)                    │
//! │  └── UNIQUE / foreign key constraints                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted cancellation or return reason.
pub const MAX_REASON_LENGTH: usize = 500;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a per-product cart quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (10)
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(10).is_ok());
/// assert!(validate_quantity(11).is_err());
/// ```
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

/// Validates a price in paise. Zero is allowed.
pub fn validate_price_paise(paise: i64) -> ValidationResult<()> {
    if paise < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a discount in basis points (0% to 100%).
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a free-text cancellation/return reason and returns it trimmed.
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }
    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LENGTH,
        });
    }
    Ok(reason.to_string())
}

/// Validates a coupon code: 6 to 12 letters or digits.
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_coupon_code;
///
/// assert!(validate_coupon_code("WELCOME10").is_ok());
/// assert!(validate_coupon_code("AB").is_err());
/// ```
pub fn validate_coupon_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "coupon code".to_string(),
        });
    }
    if !(6..=12).contains(&code.len()) {
        return Err(ValidationError::OutOfRange {
            field: "coupon code length".to_string(),
            min: 6,
            max: 12,
        });
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "coupon code".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }
    Ok(())
}

/// Six-digit Indian postal code, not starting with 0.
pub fn validate_pincode(pincode: &str) -> ValidationResult<()> {
    let valid = pincode.len() == 6
        && pincode.chars().all(|c| c.is_ascii_digit())
        && !pincode.starts_with('0');
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "pincode".to_string(),
            reason: "must be 6 digits".to_string(),
        });
    }
    Ok(())
}

/// Ten-digit mobile number starting with 6-9.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let valid = phone.len() == 10
        && phone.chars().all(|c| c.is_ascii_digit())
        && matches!(phone.chars().next(), Some('6'..='9'));
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must be a 10 digit mobile number".to_string(),
        });
    }
    Ok(())
}

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_uuid;
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

// =============================================================================
// Unit Tests
// =============================================================================
