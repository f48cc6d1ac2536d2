//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Handler                                                                │
//! │  Result<Json<T>, ApiError>                                              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  OrderError ──kind()──► ErrorCode ──► HTTP status + JSON body           │
//! │                                                                         │
//! │  { "code": "INSUFFICIENT_FUNDS",                                        │
//! │    "message": "Insufficient wallet balance: available ₹200.00, ..." }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal failures are logged here with their full context and reach the
//! client only as a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use bazaar_orders::{ErrorKind, OrderError};

/// Body of every failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Operation not allowed in the current state (409)
    NotEligible,

    /// Insufficient stock (409)
    InsufficientStock,

    /// Wallet balance too low (402)
    InsufficientFunds,

    /// Coupon rejected (422)
    InvalidCoupon,

    /// Payment signature mismatch (400)
    PaymentVerificationFailed,

    /// Resource not found (404)
    NotFound,

    /// Missing identity headers (401)
    Unauthorized,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ValidationError | ErrorCode::PaymentVerificationFailed => StatusCode::BAD_REQUEST,
            ErrorCode::NotEligible | ErrorCode::InsufficientStock => StatusCode::CONFLICT,
            ErrorCode::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::InvalidCoupon => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        let code = match err.kind() {
            ErrorKind::Validation => ErrorCode::ValidationError,
            ErrorKind::NotEligible => ErrorCode::NotEligible,
            ErrorKind::InsufficientStock => ErrorCode::InsufficientStock,
            ErrorKind::InsufficientFunds => ErrorCode::InsufficientFunds,
            ErrorKind::InvalidCoupon => ErrorCode::InvalidCoupon,
            ErrorKind::PaymentVerificationFailed => ErrorCode::PaymentVerificationFailed,
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::Internal => {
                tracing::error!(error = %err, "Request failed");
                return ApiError::new(ErrorCode::Internal, "Something went wrong, please try again");
            }
        };
        ApiError::new(code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
