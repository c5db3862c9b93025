//! Gateway error types

use chat_rest::RestError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Gateway error type
///
/// Everything except [`GatewayError::Discovery`] raised by `connect` and
/// [`GatewayError::FatalClose`] is absorbed by the reconnect loop and only
/// logged.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Dial, read or write failure on the socket
    #[error("WebSocket error: {0}")]
    Transport(Box<tungstenite::Error>),

    /// Server broke the handshake contract
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Gateway endpoint discovery failed
    #[error("Gateway discovery failed: {0}")]
    Discovery(#[from] RestError),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// Server closed with a code that forbids reconnecting
    #[error("Gateway closed with fatal code {0}")]
    FatalClose(u16),

    /// The connection's writer is gone
    #[error("Connection closed")]
    Closed,
}

impl From<tungstenite::Error> for GatewayError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl GatewayError {
    /// Whether the reconnect loop should keep going after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::FatalClose(_))
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
