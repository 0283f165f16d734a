/*!
 * Error types
 * Process-level failures, wire failure reasons and admin API errors
 */

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors that abort startup or the server loop
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Reason codes carried by failure responses.
///
/// Serialized as the bare numeric code. `Forced` carries a code programmed
/// through an expectation and is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("internal error, unknown")]
    InternalErrorUnknown,

    #[error("aborted")]
    Aborted,

    #[error("unexpected error")]
    UnexpectedError,

    #[error("unable to serve the request, invalid request structure")]
    InvalidRequestStructure,

    #[error("missing referenceId")]
    MissingReferenceId,

    #[error("missing requestId")]
    MissingRequestId,

    #[error("unable to fetch biometric details")]
    UnableToFetchBiometricDetails,

    #[error("missing reference URL")]
    MissingReferenceUrl,

    #[error("missing requesttime")]
    MissingRequestTime,

    #[error("referenceId already exists")]
    ReferenceIdAlreadyExists,

    #[error("CBEFF has no data")]
    CbeffHasNoData,

    #[error("referenceId not found")]
    ReferenceIdNotFound,

    #[error("invalid version")]
    InvalidVersion,

    #[error("invalid id")]
    InvalidId,

    #[error("invalid requesttime format")]
    InvalidRequestTimeFormat,

    #[error("invalid CBEFF format")]
    InvalidCbeffFormat,

    #[error("data share URL expired")]
    DataShareUrlExpired,

    #[error("biometric quality check failed")]
    BiometricQualityCheckFailed,

    #[error("forced failure {0}")]
    Forced(String),
}

impl FailureReason {
    pub fn code(&self) -> &str {
        match self {
            FailureReason::InternalErrorUnknown => "1",
            FailureReason::Aborted => "2",
            FailureReason::UnexpectedError => "3",
            FailureReason::InvalidRequestStructure => "4",
            FailureReason::MissingReferenceId => "5",
            FailureReason::MissingRequestId => "6",
            FailureReason::UnableToFetchBiometricDetails => "7",
            FailureReason::MissingReferenceUrl => "8",
            FailureReason::MissingRequestTime => "9",
            FailureReason::ReferenceIdAlreadyExists => "10",
            FailureReason::CbeffHasNoData => "11",
            FailureReason::ReferenceIdNotFound => "12",
            FailureReason::InvalidVersion => "13",
            FailureReason::InvalidId => "14",
            FailureReason::InvalidRequestTimeFormat => "15",
            FailureReason::InvalidCbeffFormat => "16",
            FailureReason::DataShareUrlExpired => "17",
            FailureReason::BiometricQualityCheckFailed => "18",
            FailureReason::Forced(code) => code,
        }
    }
}

impl Serialize for FailureReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// A service-specific admin error code, e.g. `MOS-MABIS-007`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: &'static str,
    pub message: &'static str,
}

/// Errors returned by the admin/configuration endpoints
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}: {detail}")]
    Invalid {
        code: &'static str,
        message: &'static str,
        detail: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    pub fn invalid(code: ErrorCode, detail: impl Into<String>) -> Self {
        ApiError::Invalid {
            code: code.code,
            message: code.message,
            detail: detail.into(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Invalid { code, .. } => (StatusCode::BAD_REQUEST, *code),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reason_serializes_as_code() {
        let json = serde_json::to_value(FailureReason::MissingRequestId).unwrap();
        assert_eq!(json, serde_json::json!("6"));

        let forced = serde_json::to_value(FailureReason::Forced("17".to_string())).unwrap();
        assert_eq!(forced, serde_json::json!("17"));
    }

    #[test]
    fn api_error_maps_to_status() {
        let code = ErrorCode {
            code: "MOS-MABIS-007",
            message: "Invalid set expectation",
        };
        let response = ApiError::invalid(code, "id is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::NotFound("session s1".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
