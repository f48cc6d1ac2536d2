//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── CouponError      - Why a coupon was refused                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bazaar-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  bazaar-orders errors                                                  │
//! │  └── OrderError       - What a service operation reports               │
//! │                                                                         │
//! │  API errors (in app)                                                   │
//! │  └── ApiError         - What the client sees (serialized)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → OrderError → ApiError → Client    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. They carry enough
/// context (ids, amounts) for a user-facing message.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The operation is not allowed in the current state.
    ///
    /// ## When This Occurs
    /// - Cancelling an order that is already Delivered
    /// - Cancelling a line that is already Cancelled
    /// - Approving a return request that was already resolved
    #[error("{entity} {id} is not eligible: {reason}")]
    NotEligible {
        entity: &'static str,
        id: String,
        reason: String,
    },

    /// Insufficient stock to reserve or commit.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Laptop X", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Wallet balance does not cover a debit.
    #[error("Insufficient wallet balance: available {available}, required {required}")]
    InsufficientFunds { available: Money, required: Money },

    /// Coupon refused (the reason is kept for logs and messages).
    #[error("Invalid coupon: {0}")]
    InvalidCoupon(#[from] CouponError),

    /// Order line id does not belong to the order.
    #[error("Line {line_id} not found in order {order_id}")]
    LineNotFound { order_id: String, line_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotEligible error.
    pub fn not_eligible(entity: &'static str, id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::NotEligible {
            entity,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Coupon Error
// =============================================================================

/// Reasons a coupon is refused.
///
/// All variants are reported to callers as a single "invalid coupon" kind;
/// the variant only refines the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("coupon {0} does not exist")]
    Unknown(String),

    #[error("coupon {0} is not active")]
    Inactive(String),

    #[error("coupon {0} has expired")]
    Expired(String),

    /// Cart subtotal is below the coupon's minimum.
    #[error("coupon {code} needs a minimum purchase of {minimum}")]
    MinimumNotMet { code: String, minimum: Money },

    /// Global `usage_limit` or the per-user limit is exhausted.
    #[error("coupon {0} has reached its usage limit")]
    UsageLimitReached(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed pincode or phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Aspire 7".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Aspire 7: available 3, requested 5"
        );

        let err = CoreError::InsufficientFunds {
            available: Money::from_rupees(200),
            required: Money::from_rupees(250),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient wallet balance: available ₹200.00, required ₹250.00"
        );
    }

    #[test]
    fn test_coupon_error_converts() {
        let core_err: CoreError = CouponError::Expired("DIWALI10".to_string()).into();
        assert!(matches!(core_err, CoreError::InvalidCoupon(CouponError::Expired(_))));
        assert_eq!(core_err.to_string(), "Invalid coupon: coupon DIWALI10 has expired");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "address_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_not_eligible_message() {
        let err = CoreError::not_eligible("Order", "o-1", "order is Delivered");
        assert_eq!(err.to_string(), "Order o-1 is not eligible: order is Delivered");
    }
}
