//! # chat-gateway
//!
//! Client side of the real-time gateway: a long-lived session that
//! identifies, keeps itself alive with heartbeats, and resumes across
//! reconnects. Dispatch events are handed to an [`EventHandler`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use chat_core::Intents;
//! use chat_gateway::{handler_fn, GatewayOptions, GatewaySession};
//! use chat_rest::{RequestDispatcher, RestOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let rest = RequestDispatcher::new("token", RestOptions::default())?;
//! let handler = Arc::new(handler_fn(|event, _data| println!("{event}")));
//! let options = GatewayOptions::default();
//! let session = GatewaySession::connect(&rest, "token", Intents::GUILDS, handler, options).await?;
//! session.wait_closed().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod events;
pub mod protocol;
pub mod session;

pub use connection::{ConnectionPhase, SessionState};
pub use error::{GatewayError, GatewayResult};
pub use events::{handler_fn, EventHandler, GatewayEventType, HandlerFn};
pub use protocol::{CloseCode, GatewayMessage, IdentifyProperties, OpCode};
pub use session::{gateway_url, GatewayOptions, GatewaySession, SessionOutcome, GATEWAY_VERSION};
