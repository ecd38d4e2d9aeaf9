//! The bulk request/response envelope.
//!
//! Every endpoint accepts a JSON array of sub-requests and answers with a
//! JSON array of equal length. Each response item carries its input index, an
//! HTTP-equivalent status, and either an `ok` payload or a structured error.

use serde::{Deserialize, Serialize};

use crate::error::AapError;

/// Client-facing error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InputValidationFailed,
    EmptyRequestNotAllowed,
    MaxRequestsExceeded,
    FailedDueToOtherErrors,
    InternalServerError,
    ConsentNotFound,
    NoSubscriptions,
    InvalidScopes,
    NotFound,
    Unauthorized,
    Forbidden,
}

impl ErrorCode {
    /// The wire spelling of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputValidationFailed => "INPUT_VALIDATION_FAILED",
            Self::EmptyRequestNotAllowed => "EMPTY_REQUEST_NOT_ALLOWED",
            Self::MaxRequestsExceeded => "MAX_REQUESTS_EXCEEDED",
            Self::FailedDueToOtherErrors => "FAILED_DUE_TO_OTHER_ERRORS",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::ConsentNotFound => "CONSENT_NOT_FOUND",
            Self::NoSubscriptions => "NO_SUBSCRIPTIONS",
            Self::InvalidScopes => "INVALID_SCOPES",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
        }
    }
}

/// A structured per-item error.
///
/// `error` is meant for end users, `error_description` for developers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub error: String,
    pub error_description: String,
}

impl ApiError {
    /// The uniform error stamped on every item of an aborted batch.
    pub fn aborted() -> Self {
        Self {
            code: ErrorCode::FailedDueToOtherErrors,
            error: "Operation aborted".to_string(),
            error_description: "The batch was aborted because another request in it failed"
                .to_string(),
        }
    }

    /// An internal error with no details leaked to the client.
    pub fn internal() -> Self {
        Self {
            code: ErrorCode::InternalServerError,
            error: "Internal server error".to_string(),
            error_description: "The request could not be completed; resubmit it later".to_string(),
        }
    }
}

impl From<&AapError> for ApiError {
    fn from(err: &AapError) -> Self {
        if err.is_internal() {
            return Self::internal();
        }
        Self {
            code: err.code(),
            error: err.code().as_str().to_lowercase().replace('_', " "),
            error_description: err.to_string(),
        }
    }
}

/// One item of a bulk response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse<O> {
    /// Position of the matching sub-request in the input array.
    pub index: usize,
    /// HTTP-equivalent status for this item.
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<O>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<O> BulkResponse<O> {
    pub fn success(index: usize, status: u16, ok: O) -> Self {
        Self {
            index,
            status,
            ok: Some(ok),
            error: None,
        }
    }

    pub fn failure(index: usize, status: u16, error: ApiError) -> Self {
        Self {
            index,
            status,
            ok: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The error code, if this item failed.
    pub fn code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}
