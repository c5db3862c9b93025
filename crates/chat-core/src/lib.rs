//! # chat-core
//!
//! Domain layer containing identifiers, intents, and the payload shapes the
//! gateway and REST engines inspect. This crate does no I/O.

pub mod entities;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    GatewayBotInfo, Message, MessageReference, ReadyEvent, SessionStartLimit, UnavailableGuild,
    User,
};
pub use value_objects::{Intents, Snowflake, SnowflakeParseError};
