//! Serializable api error types and error kinds returned by Payline
//! services.
//!
//! Every error crossing the HTTP boundary is rendered as an [`ErrorResponse`]
//! JSON body with a stable numeric [`ErrorCode`]; clients match on the code,
//! not the message. Inside the services, fallible paths produce [`ApiError`]
//! values (or `anyhow` chains that are converted at the handler edge).

use std::fmt::{self, Display};

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `ErrorCode` is the common serialized representation for all
/// [`ErrorKind`]s.
pub type ErrorCode = u16;

/// The common JSON-serialized representation for all [`ApiError`]s. It is
/// the only error struct actually sent across the wire.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub msg: String,
}

/// A trait to get the HTTP status code for a given error.
pub trait ToHttpStatus {
    fn to_http_status(&self) -> StatusCode;
}

/// The closed set of error kinds the pipeline recognizes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Missing `Idempotency-Key` header.
    MissingKey,
    /// Malformed or incomplete client input.
    Validation,
    /// The requested entity does not exist.
    NotFound,
    /// The operation was already performed; absorbed via idempotency.
    Duplicate,
    /// Invalid state transition.
    Conflict,
    /// A Store / KV / Bus / Log dependency failed.
    Upstream,
    /// An outbound call missed its deadline.
    Timeout,
    /// Anything unanticipated.
    Internal,
    /// An error code unrecognized by this version of the software.
    Unknown(ErrorCode),
}

impl ErrorKind {
    /// All known error kind variants, excluding `Unknown(_)`.
    pub const KINDS: [Self; 8] = [
        Self::MissingKey,
        Self::Validation,
        Self::NotFound,
        Self::Duplicate,
        Self::Conflict,
        Self::Upstream,
        Self::Timeout,
        Self::Internal,
    ];

    /// Returns the serializable [`ErrorCode`] for this error kind.
    pub fn to_code(self) -> ErrorCode {
        match self {
            Self::MissingKey => 1000,
            Self::Validation => 1001,
            Self::NotFound => 1002,
            Self::Duplicate => 1003,
            Self::Conflict => 1004,
            Self::Upstream => 1005,
            Self::Timeout => 1006,
            Self::Internal => 1007,
            Self::Unknown(code) => code,
        }
    }

    /// Returns the error kind for a raw [`ErrorCode`]. Infallible for
    /// backwards compatibility: unrecognized codes map to `Unknown(_)`.
    pub fn from_code(code: ErrorCode) -> Self {
        match code {
            1000 => Self::MissingKey,
            1001 => Self::Validation,
            1002 => Self::NotFound,
            1003 => Self::Duplicate,
            1004 => Self::Conflict,
            1005 => Self::Upstream,
            1006 => Self::Timeout,
            1007 => Self::Internal,
            other => Self::Unknown(other),
        }
    }

    /// The human-readable message prefix for this error kind.
    pub fn to_msg(self) -> &'static str {
        match self {
            Self::MissingKey => "Missing idempotency key",
            Self::Validation => "Invalid request",
            Self::NotFound => "Not found",
            Self::Duplicate => "Duplicate operation",
            Self::Conflict => "Conflicting state transition",
            Self::Upstream => "Upstream dependency failed",
            Self::Timeout => "Deadline exceeded",
            Self::Internal => "Internal error",
            Self::Unknown(_) => "Unknown error",
        }
    }
}

impl ToHttpStatus for ErrorKind {
    fn to_http_status(&self) -> StatusCode {
        match self {
            Self::MissingKey => StatusCode::BAD_REQUEST,
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Duplicate => StatusCode::CONFLICT,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Upstream => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_msg())
    }
}

/// The API error type used across all Payline HTTP handlers.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub msg: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, msg: impl Display) -> Self {
        Self {
            kind,
            msg: msg.to_string(),
        }
    }

    pub fn missing_key() -> Self {
        Self::new(ErrorKind::MissingKey, "Idempotency-Key header is required")
    }

    pub fn validation(msg: impl Display) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }

    pub fn not_found(msg: impl Display) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn conflict(msg: impl Display) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }

    pub fn upstream(msg: impl Display) -> Self {
        Self::new(ErrorKind::Upstream, msg)
    }

    pub fn timeout(msg: impl Display) -> Self {
        Self::new(ErrorKind::Timeout, msg)
    }

    pub fn internal(msg: impl Display) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind_msg = self.kind.to_msg();
        let msg = &self.msg;
        write!(f, "{kind_msg}: {msg}")
    }
}

impl ToHttpStatus for ApiError {
    fn to_http_status(&self) -> StatusCode {
        self.kind.to_http_status()
    }
}

impl From<ErrorResponse> for ApiError {
    fn from(err_resp: ErrorResponse) -> Self {
        let ErrorResponse { code, msg } = err_resp;
        Self {
            kind: ErrorKind::from_code(code),
            msg,
        }
    }
}

impl From<ApiError> for ErrorResponse {
    fn from(api_error: ApiError) -> Self {
        let ApiError { kind, msg } = api_error;
        Self {
            code: kind.to_code(),
            msg,
        }
    }
}

// `anyhow` chains bubbling out of a handler are unanticipated by definition.
impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(format!("{error:#}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Error codes are a wire contract; from_code must invert to_code for
    /// every known kind, and unknown codes must not panic.
    #[test]
    fn error_code_roundtrip() {
        for kind in ErrorKind::KINDS {
            assert_eq!(ErrorKind::from_code(kind.to_code()), kind);
        }
        assert_eq!(ErrorKind::from_code(9999), ErrorKind::Unknown(9999));
        assert_eq!(ErrorKind::Unknown(9999).to_code(), 9999);
    }

    #[test]
    fn http_statuses() {
        use http::StatusCode;
        assert_eq!(
            ApiError::missing_key().to_http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::validation("x").to_http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found("x").to_http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::timeout("x").to_http_status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn error_response_roundtrip() {
        let error = ApiError::validation("amount is required");
        let resp = ErrorResponse::from(error.clone());
        assert_eq!(ApiError::from(resp), error);
    }
}
