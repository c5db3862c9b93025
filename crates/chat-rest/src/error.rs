//! REST error types

use thiserror::Error;

/// Errors surfaced by the REST layer
///
/// Non-2xx responses other than 429 are not errors at this level: they are
/// delivered as a [`RestResponse`](crate::RestResponse) and only become
/// [`RestError::Status`] when the caller asks for it.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("REST client is shutting down")]
    Shutdown,

    #[error("Request was dropped before a response was delivered")]
    Cancelled,

    #[error("Request rejected with status {status}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

impl RestError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport failures are the only ones the drain loop retries
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;
