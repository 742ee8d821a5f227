use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub const STATUS_CODE_HEADER: HeaderName = HeaderName::from_static("grpc-status");
pub const STATUS_MESSAGE_HEADER: HeaderName = HeaderName::from_static("grpc-message");

/// Why a call was not allowed to proceed.
///
/// Every variant carries the reason surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    FailedPrecondition(String),
    #[error("{0}")]
    ResourceExhausted(String),
    #[error("{0}")]
    Aborted(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

/// Protocol status codes, numbered as in gRPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Code {
    InvalidArgument = 3,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    Internal = 13,
    Unavailable = 14,
}

impl ValidationError {
    pub fn code(&self) -> Code {
        match self {
            ValidationError::InvalidArgument(_) => Code::InvalidArgument,
            ValidationError::PermissionDenied(_) => Code::PermissionDenied,
            ValidationError::FailedPrecondition(_) => Code::FailedPrecondition,
            ValidationError::ResourceExhausted(_) => Code::ResourceExhausted,
            ValidationError::Aborted(_) => Code::Aborted,
            ValidationError::Unavailable(_) => Code::Unavailable,
            ValidationError::Internal(_) => Code::Internal,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ValidationError::InvalidArgument(reason)
            | ValidationError::PermissionDenied(reason)
            | ValidationError::FailedPrecondition(reason)
            | ValidationError::ResourceExhausted(reason)
            | ValidationError::Aborted(reason)
            | ValidationError::Unavailable(reason)
            | ValidationError::Internal(reason) => reason,
        }
    }

    /// Transport failures are the only rejections a caller may retry as is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ValidationError::Unavailable(_) | ValidationError::Internal(_)
        )
    }

    fn with_status_headers(&self, mut response: Response) -> Response {
        let code = HeaderValue::from(self.code() as u16);
        let message = HeaderValue::from_str(self.reason())
            .unwrap_or_else(|_| HeaderValue::from_static("invalid payment"));
        response.headers_mut().insert(STATUS_CODE_HEADER, code);
        response.headers_mut().insert(STATUS_MESSAGE_HEADER, message);
        response
    }

    /// Trailers-only gRPC response: HTTP 200 with the status in the headers.
    pub fn into_grpc_response(self) -> Response {
        let response = (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/grpc"))],
        )
            .into_response();
        self.with_status_headers(response)
    }
}

impl From<ValidationError> for StatusCode {
    fn from(error: ValidationError) -> Self {
        match error.code() {
            Code::InvalidArgument => StatusCode::BAD_REQUEST,
            Code::PermissionDenied => StatusCode::PAYMENT_REQUIRED,
            Code::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
            Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            Code::Aborted => StatusCode::CONFLICT,
            Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let response = StatusCode::from(self.clone()).into_response();
        self.with_status_headers(response)
    }
}

/// Failure of the channel state store itself, never a payment decision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("channel store unavailable: {0}")]
    Unavailable(String),
    #[error("channel store failure: {0}")]
    Internal(String),
}

impl From<StoreError> for ValidationError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(_) => ValidationError::Unavailable(error.to_string()),
            StoreError::Internal(_) => ValidationError::Internal(error.to_string()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("chain oracle unavailable: {0}")]
    Unavailable(String),
    #[error("chain oracle returned malformed data: {0}")]
    Malformed(String),
}

impl From<OracleError> for ValidationError {
    fn from(error: OracleError) -> Self {
        match error {
            OracleError::Unavailable(_) => ValidationError::Unavailable(error.to_string()),
            OracleError::Malformed(_) => ValidationError::Internal(error.to_string()),
        }
    }
}
