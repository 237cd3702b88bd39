//! Error types for Hetzner Cloud operations.
//!
//! The taxonomy separates transport and authentication failures, which end a
//! run at the point they occur, from provider rejections of a single request,
//! which callers may contain to the step that issued them.

use thiserror::Error;

/// Main error type for Hetzner Cloud operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider rejected a create request
    #[error("Failed to create {resource}: {message}")]
    CreationFailed {
        /// Kind of resource that could not be created
        resource: String,
        /// Provider error message
        message: String,
    },

    /// Both attach request encodings were rejected
    #[error("Failed to apply firewall: {primary}; alternative encoding: {fallback}")]
    AttachFailed {
        /// Error from the primary request encoding
        primary: String,
        /// Error from the alternative request encoding
        fallback: String,
    },

    /// Conflict with existing state (uniqueness, locks, quotas)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad request with details
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing, invalid or insufficient credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Request rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Provider is unavailable or failed internally
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Operation timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Failed to parse a provider response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Invalid resource identifier
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Specialized result type for Hetzner Cloud operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::CreationFailed { .. } => "CREATION_FAILED",
            Self::AttachFailed { .. } => "ATTACH_FAILED",
            Self::Conflict(_) => "CONFLICT",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Timeout(_) => "TIMEOUT",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::InvalidId(_) => "INVALID_ID",
            Self::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Returns true for transport, authentication and configuration failures.
    ///
    /// These are never contained to a single reconciliation step.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_)
                | Self::ServiceUnavailable(_)
                | Self::Timeout(_)
                | Self::HttpError(_)
                | Self::ParseError(_)
                | Self::ConfigError(_)
                | Self::InvalidEndpoint(_)
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
