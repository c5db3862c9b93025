//! Connection management
//!
//! Session state that survives reconnects, the reconnect backoff, the
//! heartbeat monitor and the driver for a single physical connection.

mod backoff;
mod connection;
mod heartbeat;
mod state;

pub use backoff::{BackoffConfig, ReconnectBackoff};
pub(crate) use connection::{run, ConnectionEnd};
pub use heartbeat::{HeartbeatExit, HeartbeatMonitor};
pub use state::{ConnectionPhase, SessionState};
