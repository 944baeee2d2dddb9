//! Error types used throughout the client

use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a [`RedkiteError`], used for retry decisions
/// and log labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed caller input - never retried
    InvalidInput,
    /// Remote quota exhausted
    RateLimit,
    /// Credentials or grant rejected
    Authentication,
    /// Transient server-side status on an idempotent request
    Transient,
    /// The remote service reported a logical failure
    Remote,
    /// Connection, timeout or body decoding failure
    Network,
    /// Client misconfiguration
    Config,
}

/// Main error type for redkite
#[derive(Error, Debug)]
pub enum RedkiteError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Rate limit exceeded; the current window resets in {reset_in:?}")]
    RateLimited { reset_in: Duration },

    #[error("Authorization grant failed: {0}")]
    AuthGrant(String),

    #[error("{url} returned retryable status {status} after {attempts} attempt(s)")]
    RetryableStatus { status: u16, url: String, attempts: u32 },

    #[error("Access token expired while a request to {url} was in flight")]
    TokenExpiredMidFlight { url: String },

    #[error("{url} returned status {status}: {body}")]
    Http { status: u16, url: String, body: String },

    #[error("Remote API error: {}", .0.join("; "))]
    RemoteApi(Vec<String>),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RedkiteError {
    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument(_) => ErrorCategory::InvalidInput,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::AuthGrant(_) | Self::TokenExpiredMidFlight { .. } => {
                ErrorCategory::Authentication
            }
            Self::RetryableStatus { .. } => ErrorCategory::Transient,
            Self::Http { status, .. } if *status == 401 || *status == 403 => {
                ErrorCategory::Authentication
            }
            Self::Http { status, .. } if *status == 429 => ErrorCategory::RateLimit,
            Self::Http { .. } | Self::RemoteApi(_) => ErrorCategory::Remote,
            Self::Network(_) | Self::Timeout(_) | Self::Decode(_) => ErrorCategory::Network,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Whether a caller could reasonably try the same operation again later.
    ///
    /// The pipeline has already spent its own retry budget by the time one of
    /// these reaches the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit | ErrorCategory::Transient | ErrorCategory::Network
        )
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RetryableStatus { status, .. } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Stable label suitable for structured logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthGrant(_) => "auth_grant",
            Self::RetryableStatus { .. } => "retryable_status",
            Self::TokenExpiredMidFlight { .. } => "token_expired_mid_flight",
            Self::Http { .. } => "http",
            Self::RemoteApi(_) => "remote_api",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Decode(_) => "decode",
            Self::Config(_) => "config",
        }
    }
}

/// Result type alias for redkite operations
pub type Result<T> = std::result::Result<T, RedkiteError>;
