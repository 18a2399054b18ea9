use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Standard error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Unprocessable Entity",
    "message": "Insufficient stock: only 3 units available",
    "timestamp": "2025-11-02T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Requested more units than are available. Recoverable: the shopper can
    /// lower the quantity or come back later. Carries the current availability
    /// for user-facing messaging.
    #[error("Insufficient stock: only {available} units available")]
    InsufficientStock { available: i32 },

    /// A release was attempted for more units than are reserved. This is a
    /// data-integrity bug upstream, not a user error.
    #[error("Invalid release: reservation smaller than released quantity")]
    InvalidRelease,

    /// Guarded status transition found the order in a different state than the
    /// transition requires. Stale UI or a double submit; treated as a no-op.
    #[error("Order is {actual}, expected {expected}")]
    OrderNotInExpectedState { expected: String, actual: String },

    #[error("Coupon is not valid or has expired")]
    CouponInvalid,

    #[error("Coupon code does not exist")]
    CouponNotFound,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    /// Single source of truth for the error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) | Self::CouponNotFound => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::OrderNotInExpectedState { .. } => StatusCode::CONFLICT,
            Self::InsufficientStock { .. } | Self::CouponInvalid | Self::EmptyCart => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            // Integrity bug: surfaced as a server error, details stay in the logs.
            Self::InvalidRelease => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for HTTP responses. Internal variants return generic
    /// text so implementation details never leak to the client.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) | Self::InvalidRelease => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}

/// Error type for HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::ServiceError(service_error) => (
                service_error.status_code(),
                service_error.response_message(),
            ),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InsufficientStock { available: 2 }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::OrderNotInExpectedState {
                expected: "ready_to_ship".into(),
                actual: "confirmed".into(),
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::CouponNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::EmptyCart.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::InvalidRelease.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("lock poisoned".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::InvalidRelease.response_message(),
            "Internal server error"
        );
        // User-facing errors keep the actual message.
        assert_eq!(
            ServiceError::InsufficientStock { available: 3 }.response_message(),
            "Insufficient stock: only 3 units available"
        );
    }

    #[test]
    fn insufficient_stock_carries_available_count() {
        let err = ServiceError::InsufficientStock { available: 7 };
        assert!(err.to_string().contains('7'));
    }
}
