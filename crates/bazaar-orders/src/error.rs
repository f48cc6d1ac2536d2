//! # Service Error Types
//!
//! One error type for every order, return, cart, checkout and wallet
//! operation.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ErrorKind                   Typical cause                              │
//! │  ─────────────────────────   ──────────────────────────────────────     │
//! │  Validation                  bad quantity, empty reason, unknown address│
//! │  NotEligible                 cancel after delivery, second approval     │
//! │  InsufficientStock           last unit taken by another buyer           │
//! │  InsufficientFunds           wallet balance below order total           │
//! │  InvalidCoupon               expired / below minimum / limit reached    │
//! │  PaymentVerificationFailed   tampered or mismatched signature           │
//! │  NotFound                    order / return / product missing           │
//! │  Internal                    storage or gateway failure                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error aborts the operation's transaction before it reaches the
//! caller, so no kind leaves a half-applied change behind.

use bazaar_core::{CoreError, CouponError, Money};
use bazaar_db::{DbError, Transient};
use thiserror::Error;

/// Result type alias for service operations.
pub type OrderResult<T> = Result<T, OrderError>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotEligible,
    InsufficientStock,
    InsufficientFunds,
    InvalidCoupon,
    PaymentVerificationFailed,
    NotFound,
    Internal,
}

#[derive(Debug, Error)]
pub enum OrderError {
    /// Bad or missing input.
    #[error("{0}")]
    Validation(String),

    /// The order, line or return is not in a state that permits the action.
    ///
    /// ## When This Occurs
    /// - Cancelling a Delivered order
    /// - Cancelling a line twice
    /// - Approving an already-resolved return
    #[error("{0}")]
    NotEligible(String),

    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    #[error("Insufficient wallet balance: available {available}, required {required}")]
    InsufficientFunds { available: Money, required: Money },

    #[error("Invalid coupon: {0}")]
    InvalidCoupon(CouponError),

    /// The gateway signature did not match.
    #[error("Payment verification failed for gateway order {gateway_order_id}")]
    PaymentVerificationFailed { gateway_order_id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The payment gateway could not be reached or refused the request.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Storage failure.
    #[error(transparent)]
    Database(DbError),
}

impl OrderError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        OrderError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        OrderError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::Validation(_) => ErrorKind::Validation,
            OrderError::NotEligible(_) => ErrorKind::NotEligible,
            OrderError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            OrderError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            OrderError::InvalidCoupon(_) => ErrorKind::InvalidCoupon,
            OrderError::PaymentVerificationFailed { .. } => ErrorKind::PaymentVerificationFailed,
            OrderError::NotFound { .. } => ErrorKind::NotFound,
            OrderError::Database(DbError::NotFound { .. }) => ErrorKind::NotFound,
            OrderError::Database(DbError::UniqueViolation { .. }) => ErrorKind::Validation,
            OrderError::Gateway(_) | OrderError::Database(_) => ErrorKind::Internal,
        }
    }
}

impl Transient for OrderError {
    fn is_transient(&self) -> bool {
        matches!(self, OrderError::Database(e) if e.is_transient())
    }
}

impl From<DbError> for OrderError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => OrderError::NotFound { entity, id },
            other => OrderError::Database(other),
        }
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

impl From<CoreError> for OrderError {
    fn from(err: CoreError) -> Self {
        match err {
            e @ CoreError::NotEligible { .. } => OrderError::NotEligible(e.to_string()),
            CoreError::InsufficientStock {
                product,
                available,
                requested,
            } => OrderError::InsufficientStock {
                product,
                available,
                requested,
            },
            CoreError::InsufficientFunds {
                available,
                required,
            } => OrderError::InsufficientFunds {
                available,
                required,
            },
            CoreError::InvalidCoupon(e) => OrderError::InvalidCoupon(e),
            CoreError::LineNotFound { order_id, line_id } => {
                OrderError::not_found("Order line", format!("{line_id} (order {order_id})"))
            }
            CoreError::Validation(e) => OrderError::Validation(e.to_string()),
        }
    }
}

impl From<CouponError> for OrderError {
    fn from(err: CouponError) -> Self {
        OrderError::InvalidCoupon(err)
    }
}

impl From<bazaar_core::ValidationError> for OrderError {
    fn from(err: bazaar_core::ValidationError) -> Self {
        OrderError::Validation(err.to_string())
    }
}
