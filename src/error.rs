//! Unified error type for zenschema.
//!
//! Four failures are specific to schema-driven requests and are kept apart so
//! callers can tell misuse from bad data:
//! - [`Error::RequestConfig`]: the request configuration itself was malformed
//! - [`Error::RequestValidation`]: request values failed their schema before sending
//! - [`Error::ResponseValidation`]: the response body failed its schema
//! - [`Error::Schema`]: a schema was used where it cannot apply
//!
//! The remaining variants cover the transport and body decoding.

use std::error::Error as StdError;

use http_kit::BodyError;
use thiserror::Error;

use crate::schema::Issues;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for all zenschema operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller supplied an invalid request shape (missing section, body on a
    /// bodyless method, both `body` and `form`, unsupported form value).
    #[error("invalid request configuration: {0}")]
    RequestConfig(String),

    /// Path or body values failed schema validation; nothing was sent.
    #[error("request validation failed: {0}")]
    RequestValidation(Issues),

    /// The response body failed schema validation.
    ///
    /// The exchange itself succeeded, only its interpretation failed.
    #[error("response validation failed: {0}")]
    ResponseValidation(Issues),

    /// A schema was applied to something it cannot describe.
    #[error("{0}")]
    Schema(String),

    /// A strict `parse` of search params or headers failed.
    #[error("validation failed: {0}")]
    Validator(Issues),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Header name or value that cannot be sent.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Network transport layer error.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),

    /// The request was cancelled through its abort signal.
    #[error("request aborted")]
    Aborted,

    /// The response body was already consumed.
    #[error("body has already been used")]
    BodyUsed,

    /// Reading the response body failed.
    #[error("failed to read body: {0}")]
    Body(#[from] BodyError),

    /// The body was not valid JSON.
    #[error("failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::RequestConfig(message.into())
    }

    /// Wrap any error raised by a transport.
    pub fn transport(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }

    /// Check if the caller misconfigured the request.
    pub const fn is_request_config_error(&self) -> bool {
        matches!(self, Self::RequestConfig(_))
    }

    /// Check if a request or response value failed validation.
    pub const fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::RequestValidation(_) | Self::ResponseValidation(_) | Self::Validator(_)
        )
    }

    /// Check if a schema was misused.
    pub const fn is_schema_error(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    /// Check if the transport failed or the request was aborted.
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Aborted)
    }

    /// Every validation issue carried by this error, if any.
    pub const fn issues(&self) -> Option<&Issues> {
        match self {
            Self::RequestValidation(issues)
            | Self::ResponseValidation(issues)
            | Self::Validator(issues) => Some(issues),
            _ => None,
        }
    }

    /// Get the error category.
    ///
    /// Useful for logging and monitoring.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RequestConfig(_) | Self::InvalidUrl(_) | Self::InvalidHeader(_) => {
                ErrorKind::RequestConfig
            }
            Self::RequestValidation(_) | Self::Validator(_) => ErrorKind::RequestValidation,
            Self::ResponseValidation(_) => ErrorKind::ResponseValidation,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Transport(_) | Self::Aborted => ErrorKind::Transport,
            Self::BodyUsed | Self::Body(_) | Self::Json(_) => ErrorKind::Body,
        }
    }
}

/// Error category labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed request configuration
    RequestConfig,
    /// Request values rejected by their schema
    RequestValidation,
    /// Response body rejected by its schema
    ResponseValidation,
    /// Schema misuse
    Schema,
    /// Transport failure
    Transport,
    /// Body reading or decoding failure
    Body,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestConfig => write!(f, "request_config"),
            Self::RequestValidation => write!(f, "request_validation"),
            Self::ResponseValidation => write!(f, "response_validation"),
            Self::Schema => write!(f, "schema"),
            Self::Transport => write!(f, "transport"),
            Self::Body => write!(f, "body"),
        }
    }
}
