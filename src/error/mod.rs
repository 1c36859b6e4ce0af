//! Centralized error handling for the financing core
//!
//! Every operation returns a typed error from this taxonomy; nothing is
//! swallowed and logged-only. The axum layer maps each variant to an HTTP
//! status and a JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// The step of the allotment orchestration that failed. The whole database
/// transaction is rolled back, so the stage is diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllotmentStage {
    TripTransition,
    InvestmentActivation,
    LenderDebit,
    BorrowerCredit,
    BidRefund,
}

impl std::fmt::Display for AllotmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AllotmentStage::TripTransition => "trip transition",
            AllotmentStage::InvestmentActivation => "investment activation",
            AllotmentStage::LenderDebit => "lender debit",
            AllotmentStage::BorrowerCredit => "borrower credit",
            AllotmentStage::BidRefund => "bid refund",
        };
        f.write_str(s)
    }
}

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Trip has already been allotted")]
    AlreadyAllotted,

    #[error("Allotment failed at {stage}, no changes applied: {cause}")]
    AllotmentFailed {
        stage: AllotmentStage,
        cause: String,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<AllotmentStage>,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidAmount(_) => "INVALID_AMOUNT",
            ApiError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::AlreadyAllotted => "ALREADY_ALLOTTED",
            ApiError::AllotmentFailed { .. } => "ALLOTMENT_FAILED",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidState(_) | ApiError::AlreadyAllotted => StatusCode::CONFLICT,
            ApiError::AllotmentFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Tag an error with the allotment stage it surfaced in. Precondition
    /// failures (`NotFound`, `AlreadyAllotted`, ...) pass through untouched so
    /// callers see the specific reason; mutation failures collapse into
    /// `AllotmentFailed` since the transaction rolls back as one unit.
    pub fn at_stage(self, stage: AllotmentStage) -> Self {
        match self {
            ApiError::Database(cause) => ApiError::AllotmentFailed { stage, cause },
            ApiError::InsufficientFunds { required, available } => ApiError::AllotmentFailed {
                stage,
                cause: format!("insufficient funds: required {required}, available {available}"),
            },
            ApiError::InvalidState(cause) => ApiError::AllotmentFailed { stage, cause },
            other => other,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        let stage = match &self {
            ApiError::AllotmentFailed { stage, .. } => Some(*stage),
            _ => None,
        };

        // Log server errors
        match &self {
            ApiError::Database(_) => {
                tracing::error!(error = %message, code = %error_code, "Server error occurred");
            }
            ApiError::AllotmentFailed { .. } => {
                tracing::warn!(error = %message, code = %error_code, "Orchestration aborted");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
                stage,
            },
        };

        (status, Json(body)).into_response()
    }
}

// Convenience conversions from common error types

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::Database(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;
