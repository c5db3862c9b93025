//! Application error types
//!
//! Umbrella error for binaries embedding the client. Library crates keep
//! their own typed errors and are folded in here as strings at the edge.

use crate::config::ConfigError;
use crate::telemetry::TracingError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Setup errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tracing(#[from] TracingError),

    // REST errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("REST request failed: {0}")]
    Rest(String),

    #[error("Request rejected with status {status}")]
    RequestFailed { status: u16, body: String },

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Gateway session invalidated")]
    SessionInvalidated,

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Get a stable error code for logs and exit reports
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Tracing(_) => "TRACING_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::Rest(_) => "REST_ERROR",
            Self::RequestFailed { .. } => "REQUEST_FAILED",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::SessionInvalidated => "SESSION_INVALIDATED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether trying the same operation again can succeed without
    /// changing the configuration
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded
            | Self::Rest(_)
            | Self::Gateway(_)
            | Self::SessionInvalidated => true,
            Self::RequestFailed { status, .. } => *status >= 500,
            Self::Config(_) | Self::Tracing(_) | Self::Internal(_) => false,
        }
    }

    /// Create a REST error from any displayable error
    #[must_use]
    pub fn rest(err: impl std::fmt::Display) -> Self {
        Self::Rest(err.to_string())
    }

    /// Create a gateway error from any displayable error
    #[must_use]
    pub fn gateway(err: impl std::fmt::Display) -> Self {
        Self::Gateway(err.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
